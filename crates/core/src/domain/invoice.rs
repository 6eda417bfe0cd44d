use std::fmt;

use chrono::{Local, NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Item name used when extraction produced no usable name.
pub const PLACEHOLDER_ITEM_NAME: &str = "—";

/// Name given to the delivery cost line item.
pub const DELIVERY_ITEM_NAME: &str = "Доставка";

const ID_SUFFIX_LEN: usize = 6;
const ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId(pub String);

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl InvoiceId {
    /// Generates a short, URL-safe identifier: current epoch milliseconds in
    /// base-36 followed by six random alphanumeric characters, uppercased.
    /// Safe to embed in storage keys; collision odds within one conversation
    /// are negligible.
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let mut id = to_base36(millis);
        let mut rng = rand::thread_rng();
        for _ in 0..ID_SUFFIX_LEN {
            let index = rng.gen_range(0..ID_ALPHABET.len());
            id.push(ID_ALPHABET[index] as char);
        }
        Self(id)
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ID_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub sum: Decimal,
}

impl LineItem {
    pub fn new(name: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self { name: name.into(), quantity, unit_price, sum: Decimal::ZERO }
    }

    pub fn delivery(unit_price: Decimal) -> Self {
        Self::new(DELIVERY_ITEM_NAME, Decimal::ONE, unit_price)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub date: NaiveDate,
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub eta_text: Option<String>,
    pub items: Vec<LineItem>,
    pub total: Decimal,
}

impl Invoice {
    /// Creates a recomputed invoice with a fresh id, today's date, empty
    /// supplier, and no delivery ETA.
    pub fn new(items: Vec<LineItem>) -> Self {
        Self::from_parts(String::new(), None, None, items)
    }

    /// Creates a recomputed invoice, back-filling absent fields with the
    /// standard defaults (today's date, empty supplier, no ETA).
    pub fn from_parts(
        supplier: String,
        date: Option<NaiveDate>,
        eta_text: Option<String>,
        items: Vec<LineItem>,
    ) -> Self {
        let mut invoice = Self {
            id: InvoiceId::generate(),
            date: date.unwrap_or_else(|| Local::now().date_naive()),
            supplier: supplier.trim().to_owned(),
            eta_text,
            items,
            total: Decimal::ZERO,
        };
        invoice.recompute();
        invoice
    }

    /// Normalizes every line item and derives the totals: quantities and
    /// unit prices are clamped to non-negative values, empty names fall back
    /// to a placeholder, `sum = quantity * unit_price`, and `total` becomes
    /// the sum over all lines. Idempotent; must run after every mutation.
    pub fn recompute(&mut self) {
        let mut total = Decimal::ZERO;
        for item in &mut self.items {
            if item.name.trim().is_empty() {
                item.name = PLACEHOLDER_ITEM_NAME.to_owned();
            }
            if item.quantity.is_sign_negative() {
                item.quantity = Decimal::ZERO;
            }
            if item.unit_price.is_sign_negative() {
                item.unit_price = Decimal::ZERO;
            }
            item.sum = item.quantity * item.unit_price;
            total += item.sum;
        }
        self.total = total;
    }

    /// One-line summary used by history and search listings.
    pub fn summary_line(&self) -> String {
        let supplier = if self.supplier.is_empty() { "—" } else { &self.supplier };
        format!("{} | {} | {} тг | {}", self.id, self.date, self.total, supplier)
    }

    /// Per-line details block used for the calendar event body.
    pub fn item_details(&self) -> String {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                format!(
                    "{}) {} — {}×{}={}",
                    index + 1,
                    item.name,
                    item.quantity,
                    item.unit_price,
                    item.sum
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Invoice {
    /// Deterministic chat rendering; also feeds the text document layout.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Накладная: {}", self.id)?;
        writeln!(f, "Дата: {}", self.date)?;
        writeln!(f, "Поставщик: {}", if self.supplier.is_empty() { "—" } else { &self.supplier })?;
        writeln!(f, "Доставка (ETA): {}", self.eta_text.as_deref().unwrap_or("—"))?;
        writeln!(f)?;
        for (index, item) in self.items.iter().enumerate() {
            writeln!(
                f,
                "{}) {} — {} × {} = {}",
                index + 1,
                item.name,
                item.quantity,
                item.unit_price,
                item.sum
            )?;
        }
        writeln!(f)?;
        write!(f, "Итого: {} тг", self.total)
    }
}
