pub mod calendar;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod errors;
pub mod eta;
pub mod extract;
pub mod flows;

pub use delivery::apply_delivery_command;
pub use domain::invoice::{
    Invoice, InvoiceId, LineItem, DELIVERY_ITEM_NAME, PLACEHOLDER_ITEM_NAME,
};
pub use errors::{ApplicationError, DomainError, InputError};
pub use eta::{parse_eta, EtaMoment};
pub use extract::extract_invoice;
pub use flows::states::{ConversationState, LineEdit, PendingAction};
