//! HTTP and WebSocket surface of the experience concierge.
//!
//! Serves the chat WebSocket, per-client stats and memory reset, service
//! info and health checks.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
