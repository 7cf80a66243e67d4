use thiserror::Error;

use burble_core::error::BurbleError;
use burble_core::types::SessionStatus;
use burble_gateway::GatewayError;
use burble_session::SessionError;
use burble_store::StoreError;

/// Errors from reconciler operations.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// A start was requested while a call is active or settling.
    #[error("a call is already active (status: {0})")]
    AlreadyActive(SessionStatus),

    /// An operation that needs a live call found none.
    #[error("no active call")]
    NotActive,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ReconcilerError> for BurbleError {
    fn from(err: ReconcilerError) -> Self {
        match err {
            ReconcilerError::Gateway(e) => BurbleError::Gateway(e.to_string()),
            ReconcilerError::Store(e) => BurbleError::Store(e.to_string()),
            other => BurbleError::Session(other.to_string()),
        }
    }
}
