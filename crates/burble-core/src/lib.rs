pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::BurbleConfig;
pub use error::{BurbleError, Result};
pub use types::*;
