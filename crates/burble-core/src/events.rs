use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CallId, ConversationId, EndReason, SessionStatus};

/// All widget-level events emitted by the session reconciler.
///
/// Events are published on a broadcast channel after state changes and
/// consumed by:
/// - The presentation shell (status line, transcript box, form visibility)
/// - The host application (logging, diagnostics)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum WidgetEvent {
    /// A new call segment was started from a disconnected state.
    CallStarted {
        call_id: CallId,
        conversation_id: ConversationId,
        timestamp: DateTime<Utc>,
    },

    /// A persisted call was resumed after a restart.
    CallResumed {
        call_id: CallId,
        prior_call_id: CallId,
        timestamp: DateTime<Utc>,
    },

    /// The conversation ended and persistent state was cleared.
    CallEnded {
        reason: EndReason,
        /// Number of call segments the conversation accumulated.
        segments: usize,
        timestamp: DateTime<Utc>,
    },

    /// The published session status changed.
    StatusChanged {
        from: SessionStatus,
        to: SessionStatus,
        timestamp: DateTime<Utc>,
    },

    /// The live transcript was replaced with new text.
    TranscriptUpdated {
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// The remote session delivered an out-of-band data payload.
    DataReceived {
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    },

    /// A gateway request failed; the attempted transition was rolled back.
    GatewayFailed {
        operation: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl WidgetEvent {
    /// The moment the event was recorded.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            WidgetEvent::CallStarted { timestamp, .. }
            | WidgetEvent::CallResumed { timestamp, .. }
            | WidgetEvent::CallEnded { timestamp, .. }
            | WidgetEvent::StatusChanged { timestamp, .. }
            | WidgetEvent::TranscriptUpdated { timestamp, .. }
            | WidgetEvent::DataReceived { timestamp, .. }
            | WidgetEvent::GatewayFailed { timestamp, .. } => *timestamp,
        }
    }
}
