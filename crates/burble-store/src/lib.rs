//! Persistent client state for the burble widget.
//!
//! One JSON snapshot per widget instance holds the active call identifier,
//! the accumulated call segment list, and the transient refresh flag. The
//! snapshot survives restarts so an interrupted conversation can be resumed;
//! it is cleared only on a confirmed end-of-conversation.

pub mod store;

pub use store::{ClientState, StateStore, StoreError};
