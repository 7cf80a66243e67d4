//! Session status machine with thread-safe transitions.
//!
//! Enforces the call lifecycle:
//! - Disconnected -> Connecting (start or resume a call)
//! - Connecting -> Connected (remote connect ack)
//! - Connected <-> Listening <-> Speaking (live conversation)
//! - any live state -> Disconnecting (user or remote initiates end)
//! - Disconnecting -> Disconnected (teardown complete)
//! - Connecting -> Disconnected (failed start rollback)

use std::sync::{Arc, Mutex};

use burble_core::types::SessionStatus;

use crate::remote::SessionError;

/// Thread-safe state machine for session status transitions.
///
/// Wraps `SessionStatus` in an `Arc<Mutex<>>` to allow safe concurrent
/// access. All transitions are validated before being applied, returning an
/// error if the requested transition is not permitted.
#[derive(Debug, Clone)]
pub struct StatusMachine {
    status: Arc<Mutex<SessionStatus>>,
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusMachine {
    /// Create a new status machine initialized to `Disconnected`.
    pub fn new() -> Self {
        Self {
            status: Arc::new(Mutex::new(SessionStatus::Disconnected)),
        }
    }

    /// Returns the current status.
    pub fn current(&self) -> SessionStatus {
        *self.status.lock().expect("status mutex poisoned")
    }

    /// Attempt to transition to the target status.
    ///
    /// Returns the previous status on success, or
    /// `SessionError::InvalidTransition` if the transition is not allowed.
    pub fn transition(&self, target: SessionStatus) -> Result<SessionStatus, SessionError> {
        let mut status = self.status.lock().expect("status mutex poisoned");
        if status.can_transition_to(&target) {
            let from = *status;
            tracing::debug!("Session status: {} -> {}", from, target);
            *status = target;
            Ok(from)
        } else {
            Err(SessionError::InvalidTransition {
                from: *status,
                to: target,
            })
        }
    }

    /// Force the status, bypassing validation. Used for teardown settling
    /// and error recovery, where the end state is authoritative regardless
    /// of what the transport last reported.
    pub fn force(&self, target: SessionStatus) -> SessionStatus {
        let mut status = self.status.lock().expect("status mutex poisoned");
        let from = *status;
        if from != target {
            tracing::debug!("Session status forced: {} -> {}", from, target);
        }
        *status = target;
        from
    }
}

// =============================================================================
// Tests
// =============================================================================
