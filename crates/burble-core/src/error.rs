use thiserror::Error;

/// Top-level error type for the burble widget runtime.
///
/// Each variant wraps a subsystem-specific error. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for BurbleError`
/// so that the `?` operator works seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BurbleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("State store error: {0}")]
    Store(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Shell error: {0}")]
    Shell(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for BurbleError {
    fn from(err: toml::de::Error) -> Self {
        BurbleError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for BurbleError {
    fn from(err: toml::ser::Error) -> Self {
        BurbleError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for BurbleError {
    fn from(err: serde_json::Error) -> Self {
        BurbleError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for burble operations.
pub type Result<T> = std::result::Result<T, BurbleError>;
