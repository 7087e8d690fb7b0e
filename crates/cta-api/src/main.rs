//! CTA API Server
//!
//! REST API server for the Clinical Trial Accelerator protocol store.

use cta_api::{create_router, state::AppState};
use cta_core::AppConfig;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cta_api=info,cta_vector=info,tower_http=debug".into()),
        )
        .init();

    tracing::info!("Starting Clinical Trial Accelerator backend...");

    // Load configuration
    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state (connects the configured backend)
    let state = Arc::new(AppState::new(config)?);
    tracing::info!("Protocol store initialized successfully");

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("CTA API server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    tracing::info!("Shutting down Clinical Trial Accelerator backend...");
    Ok(())
}
