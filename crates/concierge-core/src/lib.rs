//! Shared domain types, configuration, and the top-level error for the
//! experience concierge.

pub mod config;
pub mod error;
pub mod types;

pub use config::ConciergeConfig;
pub use error::{ConciergeError, Result};
pub use types::*;
