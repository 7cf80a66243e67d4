//! Remote session abstraction for the burble widget.
//!
//! Wraps whichever third-party real-time media SDK carries the actual call in
//! a narrow trait, so the reconciler never sees SDK-specific callback shapes.
//!
//! # Modules
//!
//! - [`status`]: thread-safe session status machine with validated transitions
//! - [`event`]: typed events a session emits (status, transcript, data)
//! - [`remote`]: the [`RemoteSession`] trait the reconciler drives
//! - [`simulated`]: an in-process session used offline and in tests

pub mod event;
pub mod remote;
pub mod simulated;
pub mod status;

pub use event::SessionEvent;
pub use remote::{RemoteSession, SessionError};
pub use simulated::SimulatedSession;
pub use status::StatusMachine;
