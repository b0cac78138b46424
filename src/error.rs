use serde::Serialize;

use crate::models::AlertStatus;

/// Failures surfaced by the dispatch engine. None of them leave an alert
/// in a different state than before the failed call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("Alert {0} not found")]
    NotFound(String),
    #[error("Cannot {attempted} alert {id} while it is {from}")]
    InvalidTransition {
        id: String,
        from: AlertStatus,
        attempted: String,
    },
    #[error("Alert {active} is already accepted; complete or cancel it before accepting another")]
    AlertBusy { active: String },
    #[error("Alert id {0} already exists")]
    DuplicateId(String),
    #[error("Alert store is busy, try again")]
    ConcurrencyTimeout,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotFoundError,
    InvalidTransitionError,
    AlertBusyError,
    DuplicateIdError,
    ConcurrencyTimeoutError,
    InvalidRequestError,
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::NotFound(_) => ErrorKind::NotFoundError,
            DispatchError::InvalidTransition { .. } => ErrorKind::InvalidTransitionError,
            DispatchError::AlertBusy { .. } => ErrorKind::AlertBusyError,
            DispatchError::DuplicateId(_) => ErrorKind::DuplicateIdError,
            DispatchError::ConcurrencyTimeout => ErrorKind::ConcurrencyTimeoutError,
            DispatchError::InvalidRequest(_) => ErrorKind::InvalidRequestError,
        }
    }
}
