//! JSON-file-backed store with load-clears-transient semantics.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use burble_core::error::BurbleError;
use burble_core::types::CallId;

/// Errors from the state store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt state file: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("state lock poisoned")]
    Poisoned,
}

impl From<StoreError> for BurbleError {
    fn from(err: StoreError) -> Self {
        BurbleError::Store(err.to_string())
    }
}

/// The durable portion of a widget's client state.
///
/// `call_id` is the most recent call segment; `call_session_ids` is the
/// append-only list of every segment in the conversation. `refreshing` is
/// transient: set on a before-unload signal and cleared the next time the
/// snapshot is opened.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientState {
    #[serde(default)]
    pub call_id: Option<CallId>,
    #[serde(default)]
    pub call_session_ids: Vec<CallId>,
    #[serde(default)]
    pub refreshing: bool,
}

impl ClientState {
    /// True when no conversation state is held.
    pub fn is_empty(&self) -> bool {
        self.call_id.is_none() && self.call_session_ids.is_empty() && !self.refreshing
    }
}

/// Durable key-value state scoped to one widget instance.
///
/// Every mutation is written through to disk immediately, so the snapshot is
/// always consistent with what the reconciler believes. A missing or corrupt
/// file degrades to empty state rather than failing the mount.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: Mutex<ClientState>,
}

impl StateStore {
    /// Open (or create) the state snapshot at `path`.
    ///
    /// Reproduces the clear-on-load behavior of the refresh flag: if the
    /// previous process set `refreshing` before going away, the flag is
    /// cleared here, but the call identifiers it protected are kept.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut state = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<ClientState>(&content) {
                Ok(state) => state,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt state file, starting empty");
                    ClientState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ClientState::default(),
            Err(e) => return Err(e.into()),
        };

        let store = if state.refreshing {
            debug!(path = %path.display(), "Refresh flag found on load, clearing");
            state.refreshing = false;
            let store = Self {
                path,
                state: Mutex::new(state),
            };
            store.persist()?;
            store
        } else {
            Self {
                path,
                state: Mutex::new(state),
            }
        };

        info!(path = %store.path.display(), "Client state opened");
        Ok(store)
    }

    /// The persisted call identifier, if a prior call exists.
    pub fn call_id(&self) -> Option<CallId> {
        self.state.lock().ok().and_then(|s| s.call_id.clone())
    }

    /// The full ordered list of call segments for this conversation.
    pub fn call_session_ids(&self) -> Vec<CallId> {
        self.state
            .lock()
            .map(|s| s.call_session_ids.clone())
            .unwrap_or_default()
    }

    /// Record a newly issued call identifier: set it as current and append
    /// it to the segment list.
    pub fn record_call(&self, call_id: CallId) -> Result<(), StoreError> {
        {
            let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
            state.call_id = Some(call_id.clone());
            state.call_session_ids.push(call_id.clone());
        }
        debug!(call_id = %call_id, "Call segment recorded");
        self.persist()
    }

    /// Set the transient refresh flag (page is about to unload).
    pub fn set_refreshing(&self) -> Result<(), StoreError> {
        {
            let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
            state.refreshing = true;
        }
        self.persist()
    }

    /// Clear the transient refresh flag (page finished loading).
    pub fn clear_refreshing(&self) -> Result<(), StoreError> {
        {
            let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
            state.refreshing = false;
        }
        self.persist()
    }

    /// Whether a refresh is currently pending.
    pub fn refresh_pending(&self) -> bool {
        self.state.lock().map(|s| s.refreshing).unwrap_or(false)
    }

    /// Drop all conversation state (confirmed end-of-conversation).
    pub fn clear(&self) -> Result<(), StoreError> {
        {
            let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
            *state = ClientState::default();
        }
        info!(path = %self.path.display(), "Client state cleared");
        self.persist()
    }

    /// True when no conversation state is held.
    pub fn is_empty(&self) -> bool {
        self.state.lock().map(|s| s.is_empty()).unwrap_or(true)
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> ClientState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn persist(&self) -> Result<(), StoreError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .clone();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&state)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
