//! Configuration management
//!
//! Handles configuration from environment variables and TOML files with
//! sensible defaults for development. The store runs fully degraded without
//! any configuration: an unset `QDRANT_URL` selects the in-memory backend and
//! an unset `OPENAI_API_KEY` selects placeholder embeddings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Vector database connection
    pub qdrant: QdrantConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "API_PORT".to_string(),
                value: port,
            })?;
        }

        // CORS origins (comma-separated)
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            config.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Qdrant
        if let Ok(url) = std::env::var("QDRANT_URL") {
            config.qdrant.url = Some(url);
        }
        if let Ok(key) = std::env::var("QDRANT_API_KEY") {
            config.qdrant.api_key = Some(key);
        }

        // Embeddings
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.embedding.openai_api_key = Some(key);
        }
        if let Ok(model) = std::env::var("OPENAI_EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(retries) = std::env::var("OPENAI_MAX_RETRIES") {
            config.embedding.max_retries =
                retries.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "OPENAI_MAX_RETRIES".to_string(),
                    value: retries,
                })?;
        }
        if let Ok(timeout) = std::env::var("OPENAI_TIMEOUT") {
            config.embedding.timeout_secs =
                timeout.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "OPENAI_TIMEOUT".to_string(),
                    value: timeout,
                })?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            // React dev servers
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
        }
    }
}

/// Vector database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    /// Qdrant gRPC URL. Unset selects the in-memory backend, which does not
    /// persist across restarts.
    pub url: Option<String>,

    /// API key for hosted Qdrant
    pub api_key: Option<String>,

    /// Vector dimension (must match the embedding model)
    pub vector_dimension: usize,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            vector_dimension: 1536, // text-embedding-ada-002
            timeout_secs: 30,
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// OpenAI API key. Unset selects placeholder embeddings.
    pub openai_api_key: Option<String>,

    /// Embedding model name
    pub model: String,

    /// Retry attempts for failed embedding requests
    pub max_retries: u32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            model: "text-embedding-ada-002".to_string(),
            max_retries: 3,
            timeout_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
