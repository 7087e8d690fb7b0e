//! Protocol store integration tests
//!
//! All tests run against the in-memory backend; no external services are
//! required.

use async_trait::async_trait;
use cta_core::{AppConfig, ProtocolMetadata, Result, StoreError};
use cta_vector::store::PLACEHOLDER_EMBEDDING_VALUE;
use cta_vector::{naming, EmbeddingClient, MemoryBackend, ProtocolStore, VectorBackend};
use std::sync::Arc;

const DIM: usize = 3;

/// Embedding client that answers every text with the same fixed vector.
struct StubEmbedding {
    vector: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for StubEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(vec![self.vector.clone(); texts.len()])
    }

    fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Embedding client that always fails, standing in for an unreachable
/// provider.
struct FailingEmbedding;

#[async_trait]
impl EmbeddingClient for FailingEmbedding {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(StoreError::Backend("provider unreachable".to_string()))
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

fn store_with(
    embeddings: Option<Arc<dyn EmbeddingClient>>,
) -> (Arc<MemoryBackend>, ProtocolStore) {
    let backend = Arc::new(MemoryBackend::new());
    let store = ProtocolStore::new(
        backend.clone(),
        embeddings,
        "text-embedding-ada-002",
        DIM,
    );
    (backend, store)
}

async fn ingest(
    store: &ProtocolStore,
    acronym: &str,
    protocol_id: &str,
    chunks: &[&str],
    embeddings: Vec<Vec<f32>>,
) -> String {
    let collection = store
        .create_protocol_collection(acronym, "A Study Protocol", None)
        .await
        .unwrap();

    let chunks: Vec<String> = chunks.iter().map(|c| c.to_string()).collect();
    let metadata = ProtocolMetadata::new(protocol_id, acronym, "A Study Protocol");
    store
        .store_protocol_with_metadata(&collection, &chunks, embeddings, &metadata)
        .await
        .unwrap();

    collection
}

// =============================================================================
// Collection creation
// =============================================================================

#[tokio::test]
async fn test_created_collection_name_is_protocol_shaped() {
    let (_, store) = store_with(None);
    let name = store
        .create_protocol_collection("THAPCA", "Therapeutic Hypothermia", Some("/tmp/p.pdf"))
        .await
        .unwrap();
    assert!(naming::is_protocol_collection(&name));
    assert!(name.starts_with("THAPCA-"));
}

#[tokio::test]
async fn test_create_rejects_acronym_without_alphanumerics() {
    let (_, store) = store_with(None);
    let result = store.create_protocol_collection("!!!", "Title", None).await;
    assert!(matches!(result, Err(StoreError::Validation(_))));
}

// =============================================================================
// Storage and the metadata duplication invariant
// =============================================================================

#[tokio::test]
async fn test_store_rejects_length_mismatch() {
    let (_, store) = store_with(None);
    let collection = store
        .create_protocol_collection("FOO", "Title", None)
        .await
        .unwrap();

    let metadata = ProtocolMetadata::new("p1", "FOO", "Title");
    let result = store
        .store_protocol_with_metadata(
            &collection,
            &["one".to_string(), "two".to_string()],
            vec![vec![0.1; DIM]],
            &metadata,
        )
        .await;
    assert!(matches!(result, Err(StoreError::Validation(_))));
}

#[tokio::test]
async fn test_all_points_carry_identical_protocol_metadata() {
    let (backend, store) = store_with(None);
    let chunks = ["alpha", "beta", "gamma", "delta"];
    let embeddings = vec![vec![0.5; DIM]; chunks.len()];
    let collection = ingest(&store, "FOO", "p1", &chunks, embeddings).await;

    let points = backend.scroll(&collection, 100).await.unwrap();
    assert_eq!(points.len(), 4);

    for field in ["protocol_id", "study_acronym", "protocol_title", "status"] {
        let first = &points[0].payload[field];
        for point in &points {
            assert_eq!(&point.payload[field], first, "field {field} differs");
        }
    }

    // Chunk-specific fields are per-point.
    let indices: Vec<u64> = points
        .iter()
        .map(|p| p.payload["chunk_index"].as_u64().unwrap())
        .collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert_eq!(points[2].payload["chunk_text"], "gamma");
    assert_eq!(points[2].payload["chunk_size"], 5);
    assert_eq!(points[0].payload["processing_version"], "1.0");
    assert_eq!(points[0].payload["embedding_model"], "text-embedding-ada-002");
}

#[tokio::test]
async fn test_chunk_size_counts_characters_not_bytes() {
    let (backend, store) = store_with(None);
    // 9 characters, 17 UTF-8 bytes.
    let chunks = ["протокол!"];
    let collection = ingest(&store, "FOO", "p1", &chunks, vec![vec![0.1; DIM]]).await;

    let points = backend.scroll(&collection, 10).await.unwrap();
    assert_eq!(points[0].payload["chunk_size"], 9);
}

// =============================================================================
// Listing and retrieval
// =============================================================================

#[tokio::test]
async fn test_listing_filters_out_non_protocol_collections() {
    let (backend, store) = store_with(None);

    ingest(&store, "FOO", "p1", &["a"], vec![vec![0.1; DIM]]).await;
    ingest(&store, "BAR", "p2", &["b"], vec![vec![0.2; DIM]]).await;
    backend
        .create_collection("unrelated_collection", DIM)
        .await
        .unwrap();

    let protocols = store.list_all_protocols().await.unwrap();
    assert_eq!(protocols.len(), 2);

    let mut acronyms: Vec<&str> = protocols.iter().map(|p| p.study_acronym.as_str()).collect();
    acronyms.sort_unstable();
    assert_eq!(acronyms, vec!["BAR", "FOO"]);
}

#[tokio::test]
async fn test_listing_skips_empty_protocol_collections() {
    let (_, store) = store_with(None);

    ingest(&store, "FOO", "p1", &["a"], vec![vec![0.1; DIM]]).await;
    // Protocol-shaped but never populated.
    store
        .create_protocol_collection("EMPTY", "Title", None)
        .await
        .unwrap();

    let protocols = store.list_all_protocols().await.unwrap();
    assert_eq!(protocols.len(), 1);
    assert_eq!(protocols[0].study_acronym, "FOO");
}

#[tokio::test]
async fn test_get_protocol_by_collection() {
    let (_, store) = store_with(None);
    let collection = ingest(
        &store,
        "FOO",
        "p1",
        &["a", "b", "c"],
        vec![vec![0.1; DIM]; 3],
    )
    .await;

    let summary = store.get_protocol_by_collection(&collection).await.unwrap();
    assert_eq!(summary.protocol_id, "p1");
    assert_eq!(summary.collection_name, collection);
    assert_eq!(summary.chunk_count, 3);
    assert_eq!(summary.status, "processing");

    assert!(store
        .get_protocol_by_collection("MISSING-a1b2c3d4")
        .await
        .is_none());
}

#[tokio::test]
async fn test_get_protocol_by_id_scans_all_protocols() {
    let (_, store) = store_with(None);
    ingest(&store, "FOO", "p1", &["a"], vec![vec![0.1; DIM]]).await;
    ingest(&store, "BAR", "p2", &["b"], vec![vec![0.2; DIM]]).await;
    let collection = ingest(&store, "BAZ", "p3", &["c"], vec![vec![0.3; DIM]]).await;

    let summary = store.get_protocol_by_id("p3").await.unwrap();
    assert_eq!(summary.study_acronym, "BAZ");
    assert_eq!(summary.collection_name, collection);

    assert!(store.get_protocol_by_id("unknown").await.is_none());

    assert_eq!(
        store.get_collection_name_for_protocol("p3").await.unwrap(),
        collection
    );
}

// =============================================================================
// Status updates
// =============================================================================

#[tokio::test]
async fn test_status_update_touches_every_point() {
    let (backend, store) = store_with(None);
    let chunks = ["a", "b", "c", "d", "e"];
    let collection = ingest(&store, "FOO", "p1", &chunks, vec![vec![0.1; DIM]; 5]).await;

    let updated = store
        .update_protocol_status(&collection, "completed")
        .await
        .unwrap();
    assert!(updated);

    let points = backend.scroll(&collection, 100).await.unwrap();
    assert_eq!(points.len(), 5);
    for point in &points {
        assert_eq!(point.payload["status"], "completed");
    }

    // A later single-point read sees the new status regardless of which
    // point gets sampled.
    let summary = store.get_protocol_by_collection(&collection).await.unwrap();
    assert_eq!(summary.status, "completed");
}

#[tokio::test]
async fn test_status_update_on_empty_collection_returns_false() {
    let (_, store) = store_with(None);
    let collection = store
        .create_protocol_collection("FOO", "Title", None)
        .await
        .unwrap();

    let updated = store
        .update_protocol_status(&collection, "completed")
        .await
        .unwrap();
    assert!(!updated);
}

#[tokio::test]
async fn test_status_update_on_missing_collection_returns_false() {
    let (_, store) = store_with(None);

    // No collection was ever created under this name; that is absence, not
    // a backend failure.
    let updated = store
        .update_protocol_status("GONE-a1b2c3d4", "completed")
        .await
        .unwrap();
    assert!(!updated);
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_then_list_and_get() {
    let (_, store) = store_with(None);
    let keep = ingest(&store, "KEEP", "p1", &["a"], vec![vec![0.1; DIM]]).await;
    let gone = ingest(&store, "GONE", "p2", &["b"], vec![vec![0.2; DIM]]).await;

    store.delete_protocol(&gone).await.unwrap();

    let protocols = store.list_all_protocols().await.unwrap();
    assert_eq!(protocols.len(), 1);
    assert_eq!(protocols[0].collection_name, keep);

    assert!(store.get_protocol_by_collection(&gone).await.is_none());

    // Deleting again is still success.
    store.delete_protocol(&gone).await.unwrap();
}

// =============================================================================
// Embedding fallbacks
// =============================================================================

#[tokio::test]
async fn test_embeddings_placeholder_when_provider_absent() {
    let (_, store) = store_with(None);

    let vectors = store
        .get_embeddings(&["a".to_string(), "b".to_string()])
        .await;
    assert_eq!(vectors.len(), 2);
    for vector in &vectors {
        assert_eq!(vector, &vec![PLACEHOLDER_EMBEDDING_VALUE; DIM]);
    }
}

#[tokio::test]
async fn test_embeddings_zero_vector_for_empty_text() {
    let (_, store) = store_with(None);

    let vectors = store
        .get_embeddings(&["".to_string(), "x".to_string(), "   ".to_string()])
        .await;
    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[0], vec![0.0; DIM]);
    assert_eq!(vectors[1], vec![PLACEHOLDER_EMBEDDING_VALUE; DIM]);
    assert_eq!(vectors[2], vec![0.0; DIM]);
}

#[tokio::test]
async fn test_embeddings_placeholder_when_provider_fails() {
    let (_, store) = store_with(Some(Arc::new(FailingEmbedding)));

    let vectors = store.get_embeddings(&["a".to_string()]).await;
    assert_eq!(vectors, vec![vec![PLACEHOLDER_EMBEDDING_VALUE; DIM]]);
}

#[tokio::test]
async fn test_embeddings_preserve_order_around_empty_texts() {
    let stub = StubEmbedding {
        vector: vec![1.0, 0.0, 0.0],
    };
    let (_, store) = store_with(Some(Arc::new(stub)));

    let vectors = store
        .get_embeddings(&["a".to_string(), "".to_string(), "b".to_string()])
        .await;
    assert_eq!(vectors[0], vec![1.0, 0.0, 0.0]);
    assert_eq!(vectors[1], vec![0.0; DIM]);
    assert_eq!(vectors[2], vec![1.0, 0.0, 0.0]);
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn test_search_returns_best_chunk_first() {
    // Query embeds to the y axis, which is closest to chunk 1.
    let stub = StubEmbedding {
        vector: vec![0.0, 1.0, 0.0],
    };
    let (_, store) = store_with(Some(Arc::new(stub)));

    let embeddings = vec![
        vec![1.0, 0.0, 0.0],
        vec![0.1, 0.9, 0.0],
        vec![0.0, 0.0, 1.0],
    ];
    let collection = ingest(&store, "FOO", "p1", &["first", "second", "third"], embeddings).await;

    let hits = store
        .search_protocol_documents(&collection, "which chunk is second", 2)
        .await
        .unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].payload.chunk_index, 1);
    assert_eq!(hits[0].payload.chunk_text, "second");
    assert!(hits[0].score >= hits[1].score);
    assert_eq!(hits[0].payload.protocol.protocol_id, "p1");
}

#[tokio::test]
async fn test_search_respects_limit() {
    let stub = StubEmbedding {
        vector: vec![1.0, 0.0, 0.0],
    };
    let (_, store) = store_with(Some(Arc::new(stub)));

    let embeddings = vec![vec![0.3; DIM]; 4];
    let collection = ingest(&store, "FOO", "p1", &["a", "b", "c", "d"], embeddings).await;

    let hits = store
        .search_protocol_documents(&collection, "anything", 3)
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_from_config_dimension_follows_embedding_model() {
    let mut config = AppConfig::default();
    config.embedding.openai_api_key = Some("test-key".to_string());
    config.embedding.model = "text-embedding-3-large".to_string();
    config.qdrant.vector_dimension = 1536;

    // The model produces 3072-wide vectors, so the stale configured
    // dimension must not win.
    let store = ProtocolStore::from_config(&config).unwrap();
    assert_eq!(store.dimension(), 3072);
}

#[test]
fn test_from_config_dimension_without_provider_uses_configured_value() {
    let mut config = AppConfig::default();
    config.qdrant.vector_dimension = 42;

    let store = ProtocolStore::from_config(&config).unwrap();
    assert_eq!(store.dimension(), 42);
}
