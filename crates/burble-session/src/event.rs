//! Typed events emitted by a remote session.

use burble_core::types::SessionStatus;

/// Events a [`crate::RemoteSession`] publishes on its broadcast channel.
///
/// This is the typed replacement for the untyped SDK callback surface: the
/// reconciler subscribes once and matches on these variants instead of
/// registering per-event-name listeners.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// The transport's connection status changed.
    StatusChanged(SessionStatus),
    /// The accumulated transcript was replaced with new text.
    TranscriptUpdated(String),
    /// The session delivered an out-of-band data payload.
    DataReceived(serde_json::Value),
}
