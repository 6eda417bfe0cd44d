use thiserror::Error;

/// Recoverable input problems. These re-prompt the user within the same
/// pending state and never discard invoice data.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("line number out of range or not a number")]
    InvalidLineNumber,
    #[error("could not parse a number")]
    InvalidNumber,
    #[error("expected `name, quantity, price`")]
    MalformedItem,
    #[error("unrecognized date/time format")]
    UnrecognizedEta,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("input not understood: {0}")]
    InputNotUnderstood(#[from] InputError),
    #[error("no active invoice for this conversation")]
    NoActiveInvoice,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("collaborator failure: {0}")]
    Collaborator(String),
}

impl ApplicationError {
    /// Short reply shown to the user when an operation fails outright.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::InputNotUnderstood(_)) => {
                "Не понял ввод. Попробуй ещё раз."
            }
            Self::Domain(DomainError::NoActiveInvoice) => "Нет активной накладной.",
            Self::Persistence(_) => "Не получилось сохранить. Попробуй позже.",
            Self::Collaborator(_) => "Внешний сервис недоступен. Попробуй позже.",
        }
    }
}
