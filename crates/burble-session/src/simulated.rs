//! An in-process remote session used offline and in tests.
//!
//! Stands in for the real media SDK: `join` walks through the connecting
//! handshake, chat messages produce a canned agent reply, and `leave` runs
//! the disconnect sequence. No audio is carried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use burble_core::types::{JoinTarget, SessionStatus};

use crate::event::SessionEvent;
use crate::remote::{RemoteSession, SessionError};
use crate::status::StatusMachine;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Simulated remote session.
pub struct SimulatedSession {
    status: StatusMachine,
    event_tx: broadcast::Sender<SessionEvent>,
    muted: AtomicBool,
    joined_target: Mutex<Option<JoinTarget>>,
}

impl Default for SimulatedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSession {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            status: StatusMachine::new(),
            event_tx,
            muted: AtomicBool::new(false),
            joined_target: Mutex::new(None),
        }
    }

    /// The join target of the active call, if any.
    pub fn joined_target(&self) -> Option<JoinTarget> {
        self.joined_target
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    fn emit(&self, event: SessionEvent) {
        // A send error only means nobody is subscribed yet.
        let _ = self.event_tx.send(event);
    }

    fn emit_status(&self, status: SessionStatus) {
        self.status.force(status);
        self.emit(SessionEvent::StatusChanged(status));
    }
}

#[async_trait]
impl RemoteSession for SimulatedSession {
    async fn join(&self, target: &JoinTarget) -> Result<(), SessionError> {
        {
            let mut guard = self
                .joined_target
                .lock()
                .map_err(|_| SessionError::Transport("join lock poisoned".to_string()))?;
            if guard.is_some() {
                return Err(SessionError::AlreadyJoined);
            }
            *guard = Some(target.clone());
        }

        debug!(join_target = %target, "Simulated session joining");
        self.emit_status(SessionStatus::Connecting);
        self.emit_status(SessionStatus::Connected);
        self.emit_status(SessionStatus::Listening);
        Ok(())
    }

    async fn leave(&self) -> Result<(), SessionError> {
        {
            let mut guard = self
                .joined_target
                .lock()
                .map_err(|_| SessionError::Transport("join lock poisoned".to_string()))?;
            if guard.take().is_none() {
                return Err(SessionError::NotJoined("leave"));
            }
        }

        debug!("Simulated session leaving");
        self.emit_status(SessionStatus::Disconnecting);
        self.emit_status(SessionStatus::Disconnected);
        Ok(())
    }

    async fn mute_speaker(&self) {
        self.muted.store(true, Ordering::SeqCst);
    }

    async fn unmute_speaker(&self) {
        self.muted.store(false, Ordering::SeqCst);
    }

    fn is_speaker_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    async fn send_text(&self, text: &str) -> Result<(), SessionError> {
        if !self.status.current().is_live() {
            return Err(SessionError::NotJoined("send text"));
        }

        self.emit(SessionEvent::DataReceived(serde_json::json!({
            "type": "user_text",
            "text": text,
        })));
        self.emit_status(SessionStatus::Speaking);
        self.emit(SessionEvent::TranscriptUpdated(format!(
            "You said: \"{}\". How else can I help?",
            text
        )));
        self.emit_status(SessionStatus::Listening);
        Ok(())
    }

    fn status(&self) -> SessionStatus {
        self.status.current()
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }
}

// =============================================================================
// Tests
// =============================================================================
