//! Presentation shell for the burble widget.
//!
//! One shell implementation serves every tenant: all behavioral variation
//! (agent name, auto start, intake form, transcript and chat visibility,
//! mute rules) comes from the [`burble_core::types::WidgetTheme`] fetched at
//! mount time. The shell holds only presentation state; everything about the
//! call itself is delegated to the reconciler.

pub mod error;
pub mod shell;

pub use error::ShellError;
pub use shell::WidgetShell;
