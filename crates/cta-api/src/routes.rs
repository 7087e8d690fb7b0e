//! API route definitions

use crate::handlers::{health, protocols};
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

/// Routes mounted under `/api`
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/protocols",
            post(protocols::ingest_protocol).get(protocols::list_protocols),
        )
        .route("/protocols/:protocol_id", get(protocols::get_protocol))
        .route(
            "/protocols/collection/:collection_name",
            get(protocols::get_protocol_by_collection).delete(protocols::delete_protocol),
        )
        .route(
            "/protocols/collection/:collection_name/status",
            patch(protocols::update_protocol_status),
        )
        .route(
            "/protocols/collection/:collection_name/search",
            post(protocols::search_protocol),
        )
}
