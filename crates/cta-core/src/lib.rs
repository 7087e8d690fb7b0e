//! CTA Core - Domain models, errors, and configuration
//!
//! This crate defines the shared abstractions for the Clinical Trial
//! Accelerator protocol store:
//! - Protocol and chunk payload models
//! - The `StoreError` taxonomy for vector backend failures
//! - Configuration management

pub mod config;

pub use config::{AppConfig, ConfigError, EmbeddingConfig, QdrantConfig, ServerConfig};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON object map used for point payloads throughout the system.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Error Types
// ============================================================================

/// Errors attributable to the vector backend or to invalid caller input.
///
/// "Not found" conditions are deliberately *not* represented here: lookups
/// return `Option`/`bool` because absence is an ordinary outcome in a
/// scan-based design, while `StoreError` signals data-loss or inconsistency
/// risk that callers must see.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Vector backend error: {0}")]
    Backend(String),

    #[error("Collection creation failed: {0}")]
    CollectionCreation(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Protocol Models
// ============================================================================

/// Status a protocol starts its lifecycle in.
pub const DEFAULT_STATUS: &str = "processing";

/// Protocol-level metadata, duplicated identically into the payload of every
/// chunk point in the protocol's collection.
///
/// There is no separate metadata table: this duplication is the single source
/// of truth, which is why reading any one point stands in for reading the
/// whole record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolMetadata {
    /// Opaque protocol identifier
    pub protocol_id: String,

    /// Study acronym (e.g., "THAPCA")
    pub study_acronym: String,

    /// Full protocol title
    pub protocol_title: String,

    /// Lifecycle status tag
    pub status: String,

    /// When the protocol document was uploaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<DateTime<Utc>>,

    /// Record creation timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Origin file reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl ProtocolMetadata {
    /// Create metadata for a freshly uploaded protocol.
    pub fn new(
        protocol_id: impl Into<String>,
        study_acronym: impl Into<String>,
        protocol_title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            protocol_id: protocol_id.into(),
            study_acronym: study_acronym.into(),
            protocol_title: protocol_title.into(),
            status: DEFAULT_STATUS.to_string(),
            upload_date: Some(now),
            created_at: Some(now),
            file_path: None,
        }
    }

    /// Set the origin file path
    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }
}

/// Payload stored with each chunk point: the protocol metadata plus
/// chunk-specific fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Protocol metadata, identical across all chunks of a collection
    #[serde(flatten)]
    pub protocol: ProtocolMetadata,

    /// 0-based position within the original document
    pub chunk_index: u32,

    /// Raw chunk text
    pub chunk_text: String,

    /// Chunk length in characters
    pub chunk_size: usize,

    /// Embedding model that produced this point's vector
    pub embedding_model: String,

    /// Version tag of the ingestion pipeline
    pub processing_version: String,

    /// Timestamp of the last write touching this point
    pub last_updated: DateTime<Utc>,
}

/// Assembled view of one protocol, derived from a single point's payload and
/// the owning collection's point count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolSummary {
    pub protocol_id: String,
    pub study_acronym: String,
    pub protocol_title: String,
    pub collection_name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub chunk_count: u64,
}

impl ProtocolSummary {
    /// Build a summary from a stored point payload.
    ///
    /// This is the only place raw payloads are interpreted as protocol
    /// records; callers go through it rather than reading payload fields
    /// directly. Returns `None` when the payload is missing the identity
    /// fields, which marks the collection as unreadable rather than
    /// fabricating a partial record.
    pub fn from_payload(collection_name: &str, chunk_count: u64, payload: &JsonMap) -> Option<Self> {
        let protocol_id = payload.get("protocol_id")?.as_str()?.to_string();
        let study_acronym = payload.get("study_acronym")?.as_str()?.to_string();
        let protocol_title = payload.get("protocol_title")?.as_str()?.to_string();

        let status = payload
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_STATUS)
            .to_string();

        let upload_date = parse_timestamp(payload.get("upload_date"));
        let stored_created_at = parse_timestamp(payload.get("created_at"));

        // Fallback priority: created_at, then upload_date, then now.
        let created_at = stored_created_at.or(upload_date).unwrap_or_else(Utc::now);

        let file_path = payload
            .get("file_path")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Some(Self {
            protocol_id,
            study_acronym,
            protocol_title,
            collection_name: collection_name.to_string(),
            status,
            upload_date,
            file_path,
            created_at,
            chunk_count,
        })
    }
}

fn parse_timestamp(value: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// One similarity-search hit: the chunk payload paired with its score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// Similarity score (cosine, higher is better)
    pub score: f32,

    #[serde(flatten)]
    pub payload: ChunkPayload,
}

// ============================================================================
// Tests
// ============================================================================
