//! Heuristic extraction of invoice line items from transcribed speech.
//!
//! The transcript is split into clauses on commas, semicolons and newlines,
//! and each clause runs through an ordered list of matchers. A clause that
//! matches nothing still becomes a line item (quantity 1, price 0) so no
//! spoken text is silently dropped. This is a best-effort scanner, not a
//! grammar: for clauses with several numbers the first token pair that
//! completes the quantity/price shape wins.

use rust_decimal::Decimal;

use crate::domain::invoice::{Invoice, LineItem};

const DELIVERY_STEMS: &[&str] = &["доставк", "delivery", "shipping"];
const UNIT_STEMS: &[&str] = &["шт", "piece", "pcs"];
const PRICE_FILLERS: &[&str] = &["по", "by", "at"];
const CURRENCY_WORDS: &[&str] = &["тг", "тенге", "kzt"];

#[derive(Clone, Debug, PartialEq)]
enum ClauseMatch {
    Delivery { price: Decimal },
    Item { name: String, quantity: Decimal, unit_price: Decimal },
}

type Matcher = fn(&[String]) -> Option<ClauseMatch>;

/// Ordered matchers; the first hit wins, a miss falls through to the
/// unparsed-clause fallback.
const MATCHERS: &[Matcher] = &[match_delivery_clause, match_item_clause];

/// Builds a complete, recomputed invoice from a raw transcript.
pub fn extract_invoice(transcript: &str) -> Invoice {
    let mut items = Vec::new();
    for clause in split_clauses(transcript) {
        let tokens: Vec<String> = clause.split_whitespace().map(str::to_owned).collect();
        let matched = MATCHERS.iter().find_map(|matcher| matcher(&tokens));
        items.push(match matched {
            Some(ClauseMatch::Delivery { price }) => LineItem::delivery(price),
            Some(ClauseMatch::Item { name, quantity, unit_price }) => {
                LineItem::new(name, quantity, unit_price)
            }
            None => LineItem::new(clause, Decimal::ONE, Decimal::ZERO),
        });
    }
    Invoice::new(items)
}

fn split_clauses(transcript: &str) -> Vec<String> {
    transcript
        .split(|c| matches!(c, ',' | ';' | '\n'))
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(str::to_owned)
        .collect()
}

/// `доставка 5000` anywhere in the clause.
fn match_delivery_clause(tokens: &[String]) -> Option<ClauseMatch> {
    delivery_price_in(tokens).map(|price| ClauseMatch::Delivery { price })
}

/// Finds a delivery keyword immediately followed by a number; shared with
/// the idle-state delivery command.
pub(crate) fn delivery_price_in(tokens: &[String]) -> Option<Decimal> {
    for (index, token) in tokens.iter().enumerate() {
        let lowered = token.to_lowercase();
        if DELIVERY_STEMS.iter().any(|stem| lowered.starts_with(stem)) {
            if let Some(price) = tokens.get(index + 1).and_then(|next| parse_amount(next)) {
                return Some(price);
            }
        }
    }
    None
}

/// `<name> <qty> [штук] [по] <price> [тг]`. The name must be non-empty, so
/// the quantity search starts at the second token.
fn match_item_clause(tokens: &[String]) -> Option<ClauseMatch> {
    for quantity_index in 1..tokens.len() {
        let Some(quantity) = parse_digits(&tokens[quantity_index]) else {
            continue;
        };

        let mut cursor = quantity_index + 1;
        if tokens
            .get(cursor)
            .is_some_and(|t| UNIT_STEMS.iter().any(|stem| t.to_lowercase().starts_with(stem)))
        {
            cursor += 1;
        }
        if tokens.get(cursor).is_some_and(|t| PRICE_FILLERS.contains(&t.to_lowercase().as_str())) {
            cursor += 1;
        }
        let Some(unit_price) = tokens.get(cursor).and_then(|t| parse_amount(t)) else {
            continue;
        };

        return Some(ClauseMatch::Item {
            name: tokens[..quantity_index].join(" "),
            quantity,
            unit_price,
        });
    }
    None
}

fn parse_digits(token: &str) -> Option<Decimal> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// A number, optionally with a currency word glued on (`2600тг`).
fn parse_amount(token: &str) -> Option<Decimal> {
    let lowered = token.to_lowercase();
    let bare = CURRENCY_WORDS
        .iter()
        .find_map(|currency| lowered.strip_suffix(currency))
        .unwrap_or(&lowered);
    parse_digits(bare)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::invoice::DELIVERY_ITEM_NAME;

    use super::extract_invoice;

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    #[test]
    fn extracts_item_and_delivery_from_transcript() {
        let invoice = extract_invoice("Антигель 50 штук по 2600, доставка 5000");

        assert_eq!(invoice.items.len(), 2);
        assert!(invoice.items[0].name.contains("Антигель"));
        assert_eq!(invoice.items[0].quantity, dec(50));
        assert_eq!(invoice.items[0].unit_price, dec(2600));
        assert_eq!(invoice.items[1].name, DELIVERY_ITEM_NAME);
        assert_eq!(invoice.items[1].quantity, Decimal::ONE);
        assert_eq!(invoice.items[1].unit_price, dec(5000));
        assert_eq!(invoice.total, dec(135_000));
    }

    #[test]
    fn defaults_are_backfilled_on_extraction() {
        let invoice = extract_invoice("масло 2 по 1500");

        assert!(invoice.supplier.is_empty());
        assert!(invoice.eta_text.is_none());
        assert!(!invoice.id.0.is_empty());
    }

    #[test]
    fn unmatched_clause_becomes_fallback_row() {
        let invoice = extract_invoice("позвонить поставщику завтра");

        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.items[0].name, "позвонить поставщику завтра");
        assert_eq!(invoice.items[0].quantity, Decimal::ONE);
        assert_eq!(invoice.items[0].unit_price, Decimal::ZERO);
        assert_eq!(invoice.total, Decimal::ZERO);
    }

    #[test]
    fn clause_with_glued_currency_still_matches() {
        let invoice = extract_invoice("фильтр 3 шт по 700тг");

        assert_eq!(invoice.items[0].quantity, dec(3));
        assert_eq!(invoice.items[0].unit_price, dec(700));
    }

    #[test]
    fn first_complete_pair_wins_for_ambiguous_clauses() {
        // Best-effort behavior, documented rather than guaranteed: "2м" is
        // not a bare number, so 50/100 anchor the pair and the unit text
        // stays in the name.
        let invoice = extract_invoice("кабель 2м 50 штук по 100");

        assert_eq!(invoice.items[0].name, "кабель 2м");
        assert_eq!(invoice.items[0].quantity, dec(50));
        assert_eq!(invoice.items[0].unit_price, dec(100));
    }

    #[test]
    fn every_clause_survives_extraction() {
        let invoice = extract_invoice("Антигель 50 по 2600; что-то непонятное\nдоставка 4000");
        assert_eq!(invoice.items.len(), 3);
    }
}
