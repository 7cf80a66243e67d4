use thiserror::Error;

use burble_core::error::BurbleError;
use burble_reconciler::ReconcilerError;

/// Errors from the presentation shell.
#[derive(Debug, Error)]
pub enum ShellError {
    /// A form field failed validation.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// A call was requested while the intake form is still unsubmitted.
    #[error("the intake form must be submitted first")]
    FormRequired,

    #[error(transparent)]
    Reconciler(#[from] ReconcilerError),
}

impl From<ShellError> for BurbleError {
    fn from(err: ShellError) -> Self {
        BurbleError::Shell(err.to_string())
    }
}
