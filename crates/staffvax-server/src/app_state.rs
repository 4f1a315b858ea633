// ABOUTME: Shared application state for the staffvax HTTP server.
// ABOUTME: Holds the one store selected at startup and the CORS origin the router allows.

use std::sync::Arc;

use axum::http::HeaderValue;
use staffvax_store::StaffStore;

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub store: Arc<dyn StaffStore>,
    pub frontend_origin: HeaderValue,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: Arc<dyn StaffStore>, frontend_origin: HeaderValue) -> Self {
        Self {
            store,
            frontend_origin,
        }
    }
}
