// ABOUTME: Route definitions for the staffvax HTTP API.
// ABOUTME: Assembles the vaccine routes, CORS for the configured frontend, and request tracing.

use axum::Router;
use axum::http::{Method, header};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;

/// Build the complete Axum router with all routes and shared state.
pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.frontend_origin.clone())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/vaccine/directorates", get(api::vaccine::list_directorates))
        .route("/api/vaccine/organisations", get(api::vaccine::list_organisations))
        .route("/api/vaccine/list-all-options", get(api::vaccine::list_all_options))
        .route("/api/vaccine/submit", post(api::vaccine::submit_response))
        .route("/api/vaccine/lookup/{email}", get(api::vaccine::lookup_staff))
        .route(
            "/api/vaccine/staff",
            get(api::vaccine::list_staff).post(api::vaccine::save_staff),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "Staff vaccination API"
}

/// Health check handler. Returns 200 OK with a simple JSON body.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;
    use axum::body::Body;
    use axum::http::HeaderValue;
    use http::Request;
    use staffvax_store::SqliteStore;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_state(dir: &TempDir) -> SharedState {
        let store = SqliteStore::open(&dir.path().join("staff.db")).unwrap();
        Arc::new(AppState::new(
            Arc::new(store),
            HeaderValue::from_static("http://localhost:3000"),
        ))
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let dir = TempDir::new().unwrap();
        let app = create_router(test_state(&dir));
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn root_returns_banner() {
        let dir = TempDir::new().unwrap();
        let resp = create_router(test_state(&dir))
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Staff vaccination API");
    }

    #[tokio::test]
    async fn cors_advertises_configured_origin() {
        let dir = TempDir::new().unwrap();
        let resp = create_router(test_state(&dir))
            .oneshot(
                Request::get("/health")
                    .header("origin", "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            resp.headers().get("access-control-allow-credentials").unwrap(),
            "true"
        );

        let resp = create_router(test_state(&dir))
            .oneshot(
                Request::get("/health")
                    .header("origin", "http://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let dir = TempDir::new().unwrap();
        let resp = create_router(test_state(&dir))
            .oneshot(Request::get("/api/unknown").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }
}
