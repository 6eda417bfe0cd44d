use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use facturo_core::{Invoice, LineItem};

/// Speech-to-text service.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;
}

/// Optional LLM-backed extraction. `Ok(None)` means the service produced
/// nothing usable and the caller should run the heuristic extractor.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Option<ExtractedDraft>>;
}

/// Turns a finished invoice into a downloadable document.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, invoice: &Invoice) -> Result<Vec<u8>>;
    fn filename(&self, invoice: &Invoice) -> String;
}

/// Invoice draft in the schema the extraction service returns. Missing
/// fields are back-filled by the same defaulting rules as the heuristic
/// path when converting to a domain invoice.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ExtractedDraft {
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub eta_text: Option<String>,
    pub items: Vec<DraftItem>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DraftItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub qty: f64,
    #[serde(default)]
    pub unit_price: f64,
}

impl ExtractedDraft {
    /// Converts to a recomputed domain invoice with a fresh id; unreadable
    /// numbers become zero, an unreadable date falls back to today.
    pub fn into_invoice(self) -> Invoice {
        let date = self
            .date
            .as_deref()
            .and_then(|text| NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok());
        let items = self
            .items
            .into_iter()
            .map(|item| {
                LineItem::new(
                    item.name.trim(),
                    Decimal::from_f64_retain(item.qty).unwrap_or_default(),
                    Decimal::from_f64_retain(item.unit_price).unwrap_or_default(),
                )
            })
            .collect();
        Invoice::from_parts(self.supplier, date, self.eta_text, items)
    }
}
