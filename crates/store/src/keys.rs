//! Storage key construction. Keys are opaque to the backends; the namespace
//! is `<entity>:<chat id>[:<entity id>]`.

use facturo_core::InvoiceId;

pub fn invoice(chat_id: i64, invoice_id: &InvoiceId) -> String {
    format!("inv:{chat_id}:{invoice_id}")
}

pub fn conversation(chat_id: i64) -> String {
    format!("conv:{chat_id}")
}

pub fn history(chat_id: i64) -> String {
    format!("invlist:{chat_id}")
}
