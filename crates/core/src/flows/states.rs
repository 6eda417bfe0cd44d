use serde::{Deserialize, Serialize};

use crate::domain::invoice::InvoiceId;

/// Which line-item field a choose/value micro-flow is editing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEdit {
    Rename,
    Quantity,
    Price,
    Delete,
}

/// How the next free-text message from the conversation is interpreted.
///
/// Each variant is a single-turn micro-flow; the payload carries everything
/// the value step needs, so an index can never be paired with the wrong
/// edit kind. `Delete` applies at the choose step and therefore has no
/// value variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingAction {
    /// Awaiting `name, quantity, price` for a new line item.
    AddItem,
    /// Awaiting a 1-based line number for the given edit.
    ChooseLine { edit: LineEdit },
    /// Awaiting the new name for the line at `index`.
    RenameLine { index: usize },
    /// Awaiting the new quantity for the line at `index`.
    SetQuantity { index: usize },
    /// Awaiting the new unit price for the line at `index`.
    SetPrice { index: usize },
    /// Awaiting delivery ETA text.
    AwaitEta,
}

/// Per-conversation state, persisted as one JSON blob per chat.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub active_invoice_id: Option<InvoiceId>,
    pub pending_action: Option<PendingAction>,
}
