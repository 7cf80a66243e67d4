//! The `RemoteSession` trait: the seam between the reconciler and the
//! real-time media transport.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use burble_core::error::BurbleError;
use burble_core::types::{JoinTarget, SessionStatus};

use crate::event::SessionEvent;

/// Errors from the remote session transport.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
    #[error("no active session to {0}")]
    NotJoined(&'static str),
    #[error("a session is already active")]
    AlreadyJoined,
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<SessionError> for BurbleError {
    fn from(err: SessionError) -> Self {
        BurbleError::Session(err.to_string())
    }
}

/// One active call with the remote agent.
///
/// At most one session per widget instance is live at a time. Only the
/// reconciler may call `join`, `leave`, and the mute operations; the
/// presentation shell consumes status and events read-only through the
/// reconciler.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Establish the real-time connection using a join target. The target is
    /// consumed by exactly one join; resuming a call requires a fresh one.
    async fn join(&self, target: &JoinTarget) -> Result<(), SessionError>;

    /// Disconnect from the remote session.
    async fn leave(&self) -> Result<(), SessionError>;

    /// Mute the speaker output.
    async fn mute_speaker(&self);

    /// Unmute the speaker output.
    async fn unmute_speaker(&self);

    /// Whether the speaker is currently muted.
    fn is_speaker_muted(&self) -> bool;

    /// Send a chat text message over the live session.
    async fn send_text(&self, text: &str) -> Result<(), SessionError>;

    /// The transport's own view of the connection status.
    fn status(&self) -> SessionStatus;

    /// Subscribe to the session's event stream.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}
