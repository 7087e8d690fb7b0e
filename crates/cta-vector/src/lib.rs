//! CTA Vector - Protocol vector store
//!
//! Stores clinical-trial protocols as chunked, embedded text in a vector
//! database, one collection per protocol. The vector database is the single
//! source of truth: protocol metadata lives duplicated inside every chunk
//! point's payload, so there is no separate relational store to keep in sync.

use async_trait::async_trait;
use cta_core::{JsonMap, Result};
use uuid::Uuid;

pub mod embedding;
pub mod memory_backend;
pub mod naming;
pub mod qdrant_backend;
pub mod store;

pub use embedding::{EmbeddingClient, OpenAiEmbedding};
pub use memory_backend::MemoryBackend;
pub use qdrant_backend::QdrantBackend;
pub use store::ProtocolStore;

/// A point ready for upsert: vector plus payload under a fresh identifier.
#[derive(Debug, Clone)]
pub struct PointRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: JsonMap,
}

/// A point read back from a collection.
#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub id: String,
    pub payload: JsonMap,
}

/// A nearest-neighbor search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub score: f32,
    pub payload: JsonMap,
}

/// The vector database primitives the protocol store is built on.
///
/// Implementations map these onto the backend's own protocol; the store
/// itself never talks to a database client directly, so tests can run
/// against [`MemoryBackend`] and production against [`QdrantBackend`].
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Provision an empty collection sized for `dimension`-wide vectors.
    async fn create_collection(&self, name: &str, dimension: usize) -> Result<()>;

    /// Drop a collection. A collection that is already gone is not an error.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Whether a collection with this name exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Names of every collection in the database, protocol-shaped or not.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Upsert a batch of points into one collection.
    async fn upsert_points(&self, collection: &str, points: Vec<PointRecord>) -> Result<()>;

    /// Read up to `limit` points with payloads. Order is backend-defined.
    async fn scroll(&self, collection: &str, limit: usize) -> Result<Vec<StoredPoint>>;

    /// Number of points currently in the collection.
    async fn point_count(&self, collection: &str) -> Result<u64>;

    /// Nearest-neighbor search scoped to one collection, best first.
    async fn search(&self, collection: &str, vector: &[f32], limit: usize)
        -> Result<Vec<SearchHit>>;

    /// Merge `patch` into the payload of each listed point.
    async fn set_payload(&self, collection: &str, point_ids: &[String], patch: JsonMap)
        -> Result<()>;
}
