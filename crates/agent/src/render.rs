use anyhow::Result;
use async_trait::async_trait;

use facturo_core::Invoice;

use crate::collaborators::DocumentRenderer;

/// Plain-text document layout built on the invoice's deterministic
/// rendering. PDF engines stay behind the same trait as an external
/// collaborator.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextDocumentRenderer;

#[async_trait]
impl DocumentRenderer for TextDocumentRenderer {
    async fn render(&self, invoice: &Invoice) -> Result<Vec<u8>> {
        Ok(format!("НАКЛАДНАЯ\n\n{invoice}\n").into_bytes())
    }

    fn filename(&self, invoice: &Invoice) -> String {
        format!("nakladnaya_{}.txt", invoice.id)
    }
}
