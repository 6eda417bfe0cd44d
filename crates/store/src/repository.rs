use facturo_core::{ConversationState, Invoice, InvoiceId};

use crate::keys;
use crate::kv::{KvStore, StoreError};

/// Typed persistence facade over a [`KvStore`] backend. One instance serves
/// all conversations; keys are namespaced per chat.
pub struct ConversationStore<S> {
    store: S,
    history_limit: usize,
}

impl<S> ConversationStore<S>
where
    S: KvStore,
{
    pub fn new(store: S, history_limit: usize) -> Self {
        Self { store, history_limit }
    }

    /// Persists a freshly created invoice and records it in the chat's
    /// history list, keeping only the most recent `history_limit` ids.
    pub async fn insert_invoice(&self, chat_id: i64, invoice: &Invoice) -> Result<(), StoreError> {
        self.update_invoice(chat_id, invoice).await?;
        let history_key = keys::history(chat_id);
        self.store.push_front(&history_key, invoice.id.0.clone()).await?;
        self.store.trim_list(&history_key, self.history_limit).await
    }

    /// Persists the current contents of an already-known invoice.
    pub async fn update_invoice(&self, chat_id: i64, invoice: &Invoice) -> Result<(), StoreError> {
        let value =
            serde_json::to_value(invoice).map_err(|e| StoreError::Codec(e.to_string()))?;
        self.store.set(&keys::invoice(chat_id, &invoice.id), value).await
    }

    pub async fn load_invoice(
        &self,
        chat_id: i64,
        invoice_id: &InvoiceId,
    ) -> Result<Option<Invoice>, StoreError> {
        let value = self.store.get(&keys::invoice(chat_id, invoice_id)).await?;
        value
            .map(|v| serde_json::from_value(v).map_err(|e| StoreError::Codec(e.to_string())))
            .transpose()
    }

    /// Loads the conversation state, falling back to the idle default for
    /// chats seen for the first time.
    pub async fn load_state(&self, chat_id: i64) -> Result<ConversationState, StoreError> {
        let value = self.store.get(&keys::conversation(chat_id)).await?;
        value
            .map(|v| serde_json::from_value(v).map_err(|e| StoreError::Codec(e.to_string())))
            .transpose()
            .map(Option::unwrap_or_default)
    }

    pub async fn save_state(
        &self,
        chat_id: i64,
        state: &ConversationState,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(state).map_err(|e| StoreError::Codec(e.to_string()))?;
        self.store.set(&keys::conversation(chat_id), value).await
    }

    /// Most recent invoices first; ids whose blobs have expired are skipped.
    pub async fn list_invoices(
        &self,
        chat_id: i64,
        limit: usize,
    ) -> Result<Vec<Invoice>, StoreError> {
        let ids = self.store.read_list(&keys::history(chat_id), limit).await?;
        let mut invoices = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(invoice) = self.load_invoice(chat_id, &InvoiceId(id)).await? {
                invoices.push(invoice);
            }
        }
        Ok(invoices)
    }
}
