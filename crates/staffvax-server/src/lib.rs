// ABOUTME: HTTP server for staffvax, exposing staff lookup and vaccination status submission.
// ABOUTME: Uses Axum over a shared StaffStore, with CORS for the frontend and request tracing.

pub mod api;
pub mod app_state;
pub mod config;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use config::{ConfigError, ServerConfig};
pub use routes::create_router;
