//! CTA API - REST server
//!
//! HTTP glue over the protocol vector store: route wiring, request/response
//! shapes, CORS, and error mapping. All storage semantics live in
//! `cta-vector`.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::http::HeaderValue;
use axum::{routing::get, Router};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/", get(handlers::health::root))
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Router over an in-memory store, for integration tests.
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(AppState::for_testing()))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    if parsed.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
