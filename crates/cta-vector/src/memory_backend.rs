//! In-memory implementation of the vector backend
//!
//! Used when no Qdrant URL is configured and as the substrate for tests.
//! Data does not persist across restarts. Points keep insertion order, so
//! "first point" reads are deterministic here; the store must not rely on
//! that against real backends.

use crate::{PointRecord, SearchHit, StoredPoint, VectorBackend};
use async_trait::async_trait;
use cta_core::{JsonMap, Result, StoreError};
use std::collections::HashMap;
use tokio::sync::RwLock;

struct MemoryPoint {
    id: String,
    vector: Vec<f32>,
    payload: JsonMap,
}

struct MemoryCollection {
    dimension: usize,
    points: Vec<MemoryPoint>,
}

/// In-memory vector store with per-collection cosine search.
#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorBackend for MemoryBackend {
    async fn create_collection(&self, name: &str, dimension: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(StoreError::CollectionCreation(format!(
                "Collection {name} already exists"
            )));
        }

        collections.insert(
            name.to_string(),
            MemoryCollection {
                dimension,
                points: Vec::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        // Removing a collection that is already gone is a no-op.
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.collections.read().await.keys().cloned().collect())
    }

    async fn upsert_points(&self, collection: &str, points: Vec<PointRecord>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::Backend(format!("Collection {collection} not found")))?;

        for point in points {
            if point.vector.len() != target.dimension {
                return Err(StoreError::Backend(format!(
                    "Vector dimension {} does not match collection dimension {}",
                    point.vector.len(),
                    target.dimension
                )));
            }

            let id = point.id.to_string();
            match target.points.iter_mut().find(|p| p.id == id) {
                Some(existing) => {
                    existing.vector = point.vector;
                    existing.payload = point.payload;
                }
                None => target.points.push(MemoryPoint {
                    id,
                    vector: point.vector,
                    payload: point.payload,
                }),
            }
        }

        Ok(())
    }

    async fn scroll(&self, collection: &str, limit: usize) -> Result<Vec<StoredPoint>> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| StoreError::Backend(format!("Collection {collection} not found")))?;

        Ok(target
            .points
            .iter()
            .take(limit)
            .map(|p| StoredPoint {
                id: p.id.clone(),
                payload: p.payload.clone(),
            })
            .collect())
    }

    async fn point_count(&self, collection: &str) -> Result<u64> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| StoreError::Backend(format!("Collection {collection} not found")))?;

        Ok(target.points.len() as u64)
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| StoreError::Search(format!("Collection {collection} not found")))?;

        let mut hits: Vec<SearchHit> = target
            .points
            .iter()
            .map(|p| SearchHit {
                score: cosine_similarity(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn set_payload(
        &self,
        collection: &str,
        point_ids: &[String],
        patch: JsonMap,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::Backend(format!("Collection {collection} not found")))?;

        for point in target.points.iter_mut() {
            if point_ids.contains(&point.id) {
                for (key, value) in &patch {
                    point.payload.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x = f64::from(x);
        let y = f64::from(y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(vector: Vec<f32>, label: &str) -> PointRecord {
        let mut payload = JsonMap::new();
        payload.insert("label".to_string(), serde_json::Value::from(label));
        PointRecord {
            id: Uuid::new_v4(),
            vector,
            payload,
        }
    }

    #[tokio::test]
    async fn test_create_collection_twice_fails() {
        let backend = MemoryBackend::new();
        backend.create_collection("FOO-a1b2c3d4", 3).await.unwrap();
        assert!(backend.create_collection("FOO-a1b2c3d4", 3).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_collection_is_ok() {
        let backend = MemoryBackend::new();
        assert!(backend.delete_collection("GONE-a1b2c3d4").await.is_ok());
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let backend = MemoryBackend::new();
        backend.create_collection("FOO-a1b2c3d4", 3).await.unwrap();
        let result = backend
            .upsert_points("FOO-a1b2c3d4", vec![record(vec![1.0, 0.0], "short")])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let backend = MemoryBackend::new();
        backend.create_collection("FOO-a1b2c3d4", 3).await.unwrap();
        backend
            .upsert_points(
                "FOO-a1b2c3d4",
                vec![
                    record(vec![1.0, 0.0, 0.0], "x-axis"),
                    record(vec![0.0, 1.0, 0.0], "y-axis"),
                    record(vec![0.7, 0.7, 0.0], "diagonal"),
                ],
            )
            .await
            .unwrap();

        let hits = backend
            .search("FOO-a1b2c3d4", &[1.0, 0.1, 0.0], 2)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].payload["label"], "x-axis");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_set_payload_merges_fields() {
        let backend = MemoryBackend::new();
        backend.create_collection("FOO-a1b2c3d4", 2).await.unwrap();
        backend
            .upsert_points("FOO-a1b2c3d4", vec![record(vec![1.0, 0.0], "keep-me")])
            .await
            .unwrap();

        let points = backend.scroll("FOO-a1b2c3d4", 10).await.unwrap();
        let mut patch = JsonMap::new();
        patch.insert("status".to_string(), serde_json::Value::from("complete"));
        backend
            .set_payload("FOO-a1b2c3d4", &[points[0].id.clone()], patch)
            .await
            .unwrap();

        let points = backend.scroll("FOO-a1b2c3d4", 10).await.unwrap();
        assert_eq!(points[0].payload["status"], "complete");
        assert_eq!(points[0].payload["label"], "keep-me");
    }

    #[test]
    fn test_cosine_zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
