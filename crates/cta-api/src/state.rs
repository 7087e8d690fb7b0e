//! Application state management

use cta_core::{AppConfig, Result};
use cta_vector::{MemoryBackend, ProtocolStore};
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Protocol vector store engine
    pub store: ProtocolStore,
}

impl AppState {
    /// Create application state from config, connecting the configured
    /// backend and embedding client.
    pub fn new(config: AppConfig) -> Result<Self> {
        let store = ProtocolStore::from_config(&config)?;
        Ok(Self { config, store })
    }

    /// State over an in-memory backend with placeholder embeddings, for
    /// integration tests.
    pub fn for_testing() -> Self {
        let config = AppConfig::default();
        let store = ProtocolStore::new(
            Arc::new(MemoryBackend::new()),
            None,
            config.embedding.model.clone(),
            8,
        );
        Self { config, store }
    }
}
