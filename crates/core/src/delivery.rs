//! Inline "set delivery cost" instruction, recognized in idle free text
//! (`добавь доставку 5000`, `доставка 7000`).

use rust_decimal::Decimal;

use crate::domain::invoice::{Invoice, LineItem};
use crate::extract;

/// Stems matched case-insensitively against existing item names when
/// deciding whether a delivery line is already present.
const DELIVERY_NAME_STEMS: &[&str] = &["достав", "delivery", "shipping"];

/// Applies an inline delivery instruction found anywhere in `text`.
///
/// On a match the existing delivery line is overwritten (never duplicated)
/// or a new one is appended, the invoice is recomputed, and `true` is
/// returned. Without a match the invoice is left untouched.
pub fn apply_delivery_command(invoice: &mut Invoice, text: &str) -> bool {
    let Some(price) = delivery_price(text) else {
        return false;
    };

    let delivery_line = LineItem::delivery(price);
    match invoice.items.iter().position(is_delivery_line) {
        Some(index) => invoice.items[index] = delivery_line,
        None => invoice.items.push(delivery_line),
    }
    invoice.recompute();
    true
}

fn delivery_price(text: &str) -> Option<Decimal> {
    let tokens: Vec<String> = text.split_whitespace().map(str::to_owned).collect();
    extract::delivery_price_in(&tokens)
}

fn is_delivery_line(item: &LineItem) -> bool {
    let name = item.name.to_lowercase();
    DELIVERY_NAME_STEMS.iter().any(|stem| name.contains(stem))
}
