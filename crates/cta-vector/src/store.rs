//! Protocol store engine
//!
//! Create, store, list, search, status-update, and delete operations over
//! per-protocol vector collections. The engine holds no protocol state
//! between calls; the vector backend is the single source of truth and the
//! sole synchronization point, so concurrent callers each issue independent
//! batched reads and writes.

use crate::{naming, EmbeddingClient, MemoryBackend, PointRecord, QdrantBackend, VectorBackend};
use chrono::Utc;
use cta_core::{
    AppConfig, ChunkPayload, JsonMap, ProtocolMetadata, ProtocolSummary, Result, ScoredChunk,
    StoreError,
};
use std::sync::Arc;
use uuid::Uuid;

/// Component value used for every placeholder vector when the embedding
/// provider is unavailable. Placeholder vectors keep ingestion and search
/// available in degraded mode at the cost of meaningless ranking.
pub const PLACEHOLDER_EMBEDDING_VALUE: f32 = 0.1;

/// Version tag written into every chunk payload at ingestion time.
pub const PROCESSING_VERSION: &str = "1.0";

// Status updates must touch every point to preserve the metadata duplication
// invariant, so the scroll is sized well past any realistic chunk count.
const STATUS_SCROLL_LIMIT: usize = 10_000;

/// The protocol vector store engine.
///
/// All state lives in the backend; the engine only carries client handles
/// plus the embedding model identity, so it is cheap to share across tasks.
pub struct ProtocolStore {
    backend: Arc<dyn VectorBackend>,
    embeddings: Option<Arc<dyn EmbeddingClient>>,
    embedding_model: String,
    dimension: usize,
}

impl ProtocolStore {
    /// Create a store over an explicit backend and optional embedding client.
    pub fn new(
        backend: Arc<dyn VectorBackend>,
        embeddings: Option<Arc<dyn EmbeddingClient>>,
        embedding_model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            backend,
            embeddings,
            embedding_model: embedding_model.into(),
            dimension,
        }
    }

    /// Assemble the configured backend and embedding client.
    ///
    /// Falls back to the in-memory backend when no Qdrant URL is set and to
    /// placeholder embeddings when no OpenAI key is set, so development and
    /// test environments run without external services.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let backend: Arc<dyn VectorBackend> = match &config.qdrant.url {
            Some(url) => {
                tracing::info!("Connecting to Qdrant at {url}");
                Arc::new(QdrantBackend::new(&config.qdrant)?)
            }
            None => {
                tracing::warn!("QDRANT_URL not set, using in-memory backend - data will not persist");
                Arc::new(MemoryBackend::new())
            }
        };

        let embeddings: Option<Arc<dyn EmbeddingClient>> =
            if config.embedding.openai_api_key.is_some() {
                Some(Arc::new(crate::OpenAiEmbedding::from_config(
                    &config.embedding,
                )?))
            } else {
                tracing::warn!("OpenAI API key not found - embeddings will use placeholder data");
                None
            };

        // Collections must be sized for the vectors the provider actually
        // produces, so a configured client's model dimension wins over the
        // configured vector dimension.
        let dimension = match &embeddings {
            Some(client) => {
                if client.dimension() != config.qdrant.vector_dimension {
                    tracing::warn!(
                        model_dimension = client.dimension(),
                        configured_dimension = config.qdrant.vector_dimension,
                        "Configured vector dimension does not match the embedding model, \
                         using the model's dimension"
                    );
                }
                client.dimension()
            }
            None => config.qdrant.vector_dimension,
        };

        Ok(Self::new(
            backend,
            embeddings,
            config.embedding.model.clone(),
            dimension,
        ))
    }

    /// Embedding dimensionality this store was configured with.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Create a new, empty collection for a protocol's chunk vectors and
    /// return its generated name.
    ///
    /// The name's uniqueness is probabilistic (8-char random suffix, no
    /// existence check); a backend-side collision surfaces as
    /// [`StoreError::CollectionCreation`].
    pub async fn create_protocol_collection(
        &self,
        study_acronym: &str,
        protocol_title: &str,
        file_path: Option<&str>,
    ) -> Result<String> {
        if !study_acronym.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(StoreError::Validation(format!(
                "Study acronym {study_acronym:?} has no alphanumeric characters"
            )));
        }

        let collection_name = naming::generate_collection_name(study_acronym);

        self.backend
            .create_collection(&collection_name, self.dimension)
            .await?;

        tracing::info!(
            collection = %collection_name,
            title = %protocol_title,
            file_path = file_path.unwrap_or("<none>"),
            "Created protocol collection"
        );
        Ok(collection_name)
    }

    /// Store a protocol's chunks and their embeddings in one batched upsert.
    ///
    /// Every point's payload carries the full protocol metadata next to the
    /// chunk-specific fields; that duplication is what later allows any
    /// single point to stand in for the whole record. Point ids are fresh
    /// v4 UUIDs, so re-storing never collides with prior points.
    pub async fn store_protocol_with_metadata(
        &self,
        collection_name: &str,
        chunks: &[String],
        embeddings: Vec<Vec<f32>>,
        metadata: &ProtocolMetadata,
    ) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::Validation(format!(
                "Chunk/embedding count mismatch: {} chunks, {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let now = Utc::now();
        let points: Vec<PointRecord> = chunks
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (chunk, vector))| {
                let payload = ChunkPayload {
                    protocol: metadata.clone(),
                    chunk_index: i as u32,
                    chunk_text: chunk.clone(),
                    chunk_size: chunk.chars().count(),
                    embedding_model: self.embedding_model.clone(),
                    processing_version: PROCESSING_VERSION.to_string(),
                    last_updated: now,
                };

                Ok(PointRecord {
                    id: Uuid::new_v4(),
                    vector,
                    payload: payload_map(&payload)?,
                })
            })
            .collect::<Result<_>>()?;

        let count = points.len();
        self.backend.upsert_points(collection_name, points).await?;

        tracing::info!(
            collection = %collection_name,
            chunks = count,
            "Stored protocol chunks"
        );
        Ok(())
    }

    /// List every protocol in the database.
    ///
    /// Scans all collections, keeps the protocol-shaped names, and reads one
    /// point per collection for metadata. A collection whose read fails or
    /// that holds no points is skipped with a warning so one corrupt
    /// collection cannot hide all others.
    pub async fn list_all_protocols(&self) -> Result<Vec<ProtocolSummary>> {
        let collections = self.backend.list_collections().await?;

        let mut protocols = Vec::new();
        for collection_name in collections {
            if !naming::is_protocol_collection(&collection_name) {
                continue;
            }

            match self.read_summary(&collection_name).await {
                Ok(Some(summary)) => protocols.push(summary),
                Ok(None) => {
                    tracing::warn!(
                        collection = %collection_name,
                        "Skipping protocol collection with no readable metadata"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        collection = %collection_name,
                        "Could not read metadata from collection: {e}"
                    );
                }
            }
        }

        Ok(protocols)
    }

    /// Fetch one protocol's summary by collection name.
    ///
    /// Returns `None` when the collection is empty or cannot be read;
    /// absence is an expected outcome here, not a failure.
    pub async fn get_protocol_by_collection(
        &self,
        collection_name: &str,
    ) -> Option<ProtocolSummary> {
        match self.read_summary(collection_name).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(
                    collection = %collection_name,
                    "Error retrieving protocol from collection: {e}"
                );
                None
            }
        }
    }

    /// Fetch one protocol's summary by protocol id.
    ///
    /// Protocol ids exist only inside payloads, so this is a linear scan
    /// over all protocol collections; lookup cost grows with total protocol
    /// count.
    pub async fn get_protocol_by_id(&self, protocol_id: &str) -> Option<ProtocolSummary> {
        match self.list_all_protocols().await {
            Ok(protocols) => protocols
                .into_iter()
                .find(|p| p.protocol_id == protocol_id),
            Err(e) => {
                tracing::warn!(protocol_id, "Error retrieving protocol: {e}");
                None
            }
        }
    }

    /// Collection name owning a protocol id, if any.
    pub async fn get_collection_name_for_protocol(&self, protocol_id: &str) -> Option<String> {
        self.get_protocol_by_id(protocol_id)
            .await
            .map(|p| p.collection_name)
    }

    /// Set the status on every point of a protocol collection.
    ///
    /// Mutation must touch all points to preserve the duplication invariant,
    /// so this scrolls the full collection and patches every id in one
    /// batched write. Returns `false` when the collection is missing or has
    /// no points; nothing to update is a valid outcome distinct from a
    /// failure.
    pub async fn update_protocol_status(
        &self,
        collection_name: &str,
        status: &str,
    ) -> Result<bool> {
        // A collection that does not exist is soft absence, same as one with
        // no points; StoreError is reserved for genuine backend failures.
        if !self.backend.collection_exists(collection_name).await? {
            return Ok(false);
        }

        let points = self
            .backend
            .scroll(collection_name, STATUS_SCROLL_LIMIT)
            .await?;

        if points.is_empty() {
            return Ok(false);
        }

        let point_ids: Vec<String> = points.into_iter().map(|p| p.id).collect();

        let mut patch = JsonMap::new();
        patch.insert("status".to_string(), serde_json::Value::from(status));
        patch.insert(
            "last_updated".to_string(),
            serde_json::Value::from(Utc::now().to_rfc3339()),
        );

        self.backend
            .set_payload(collection_name, &point_ids, patch)
            .await?;

        tracing::info!(
            collection = %collection_name,
            status,
            points = point_ids.len(),
            "Updated protocol status"
        );
        Ok(true)
    }

    /// Delete an entire protocol collection. Idempotent: a collection that
    /// is already gone is treated as success.
    pub async fn delete_protocol(&self, collection_name: &str) -> Result<()> {
        self.backend.delete_collection(collection_name).await?;
        tracing::info!(collection = %collection_name, "Deleted protocol collection");
        Ok(())
    }

    /// Similarity search within one protocol's collection.
    ///
    /// The query is embedded through [`Self::get_embeddings`], so an
    /// unavailable provider degrades to placeholder ranking instead of
    /// failing. Hits come back best first, each with its full chunk payload.
    pub async fn search_protocol_documents(
        &self,
        collection_name: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let query_embedding = self
            .get_embeddings(&[query.to_string()])
            .await
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Search("No query embedding produced".to_string()))?;

        let hits = self
            .backend
            .search(collection_name, &query_embedding, limit)
            .await?;

        let chunks = hits
            .into_iter()
            .filter_map(|hit| {
                match serde_json::from_value::<ChunkPayload>(serde_json::Value::Object(
                    hit.payload,
                )) {
                    Ok(payload) => Some(ScoredChunk {
                        score: hit.score,
                        payload,
                    }),
                    Err(e) => {
                        tracing::warn!(
                            collection = %collection_name,
                            "Skipping search hit with malformed payload: {e}"
                        );
                        None
                    }
                }
            })
            .collect();

        Ok(chunks)
    }

    /// Generate embeddings for a batch of texts, in input order.
    ///
    /// Empty or whitespace-only texts map to zero vectors without touching
    /// the provider (providers commonly reject empty input). Provider
    /// absence or failure maps the remaining texts to placeholder vectors
    /// of [`PLACEHOLDER_EMBEDDING_VALUE`] with a logged warning; embedding
    /// failures degrade search quality but never abort ingestion.
    pub async fn get_embeddings(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let non_empty: Vec<String> = texts
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.trim().to_string())
            .collect();

        let embedded = if non_empty.is_empty() {
            Vec::new()
        } else {
            match &self.embeddings {
                Some(client) => match client.embed_batch(&non_empty).await {
                    Ok(embeddings) if embeddings.len() == non_empty.len() => embeddings,
                    Ok(embeddings) => {
                        tracing::warn!(
                            expected = non_empty.len(),
                            got = embeddings.len(),
                            "Embedding provider returned wrong count, using placeholder embeddings"
                        );
                        self.placeholder_embeddings(non_empty.len())
                    }
                    Err(e) => {
                        tracing::warn!("Falling back to placeholder embeddings: {e}");
                        self.placeholder_embeddings(non_empty.len())
                    }
                },
                None => {
                    tracing::warn!("Embedding client not available, using placeholder embeddings");
                    self.placeholder_embeddings(non_empty.len())
                }
            }
        };

        // Reassemble in original order, zero vectors standing in for the
        // texts that were filtered out.
        let mut embedded = embedded.into_iter();
        texts
            .iter()
            .map(|t| {
                if t.trim().is_empty() {
                    vec![0.0; self.dimension]
                } else {
                    embedded
                        .next()
                        .unwrap_or_else(|| vec![PLACEHOLDER_EMBEDDING_VALUE; self.dimension])
                }
            })
            .collect()
    }

    fn placeholder_embeddings(&self, count: usize) -> Vec<Vec<f32>> {
        vec![vec![PLACEHOLDER_EMBEDDING_VALUE; self.dimension]; count]
    }

    /// Read one point's payload and the point count, and assemble a summary.
    /// Any point works: the protocol-level fields are identical across the
    /// collection by invariant.
    async fn read_summary(&self, collection_name: &str) -> Result<Option<ProtocolSummary>> {
        let points = self.backend.scroll(collection_name, 1).await?;

        let Some(first) = points.first() else {
            return Ok(None);
        };

        let chunk_count = self.backend.point_count(collection_name).await?;

        Ok(ProtocolSummary::from_payload(
            collection_name,
            chunk_count,
            &first.payload,
        ))
    }
}

fn payload_map(payload: &ChunkPayload) -> Result<JsonMap> {
    match serde_json::to_value(payload) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(StoreError::Validation(
            "Chunk payload did not serialize to an object".to_string(),
        )),
        Err(e) => Err(StoreError::Validation(format!(
            "Failed to serialize chunk payload: {e}"
        ))),
    }
}
