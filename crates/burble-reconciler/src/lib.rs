//! Session reconciliation for the burble widget.
//!
//! The reconciler is the single writer of call lifecycle state. It mediates
//! between three parties that must never get out of step:
//! - the backend gateway, which issues and settles call segments
//! - the remote media session, which carries the live conversation
//! - the persistent client state, which lets a conversation survive restarts
//!
//! All mutating operations are serialized behind one async lock, so a start
//! racing an end (or a remote disconnect racing either) resolves to a
//! deterministic order instead of interleaved partial updates.

pub mod error;
pub mod reconciler;

pub use error::ReconcilerError;
pub use reconciler::{AgentIdentity, Reconciler};
