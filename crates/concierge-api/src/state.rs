//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use concierge_catalog::CatalogStore;
use concierge_chat::ConversationHub;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Active sessions and reply composition.
    pub hub: Arc<ConversationHub>,
    /// Read-only catalog, for service info and health.
    pub catalog: Arc<dyn CatalogStore>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(hub: Arc<ConversationHub>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            hub,
            catalog,
            start_time: Instant::now(),
        }
    }
}
