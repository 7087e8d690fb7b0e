//! Qdrant implementation of the vector backend
//!
//! Provides connection management and the collection/point primitives the
//! protocol store is built on. One Qdrant collection holds exactly one
//! protocol's chunk points.

use crate::{PointRecord, SearchHit, StoredPoint, VectorBackend};
use async_trait::async_trait;
use cta_core::{JsonMap, QdrantConfig, Result, StoreError};
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, CreateCollectionBuilder, Distance, PointId,
    PointStruct, PointsIdsList, ScrollPointsBuilder, SearchPointsBuilder,
    SetPayloadPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::time::Duration;

/// Qdrant-backed vector store
pub struct QdrantBackend {
    client: Qdrant,
}

impl QdrantBackend {
    /// Create a new Qdrant connection from config.
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        let url = config
            .url
            .as_ref()
            .ok_or_else(|| StoreError::Config("Qdrant URL not configured".to_string()))?;

        let mut builder = Qdrant::from_url(url).timeout(Duration::from_secs(config.timeout_secs));
        if let Some(api_key) = &config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| StoreError::Backend(format!("Qdrant connection failed: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    async fn create_collection(&self, name: &str, dimension: usize) -> Result<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
                    dimension as u64,
                    Distance::Cosine,
                )),
            )
            .await
            .map_err(|e| {
                StoreError::CollectionCreation(format!("Failed to create collection {name}: {e}"))
            })?;

        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        // Normalize "already gone" to success.
        if !self.collection_exists(name).await? {
            return Ok(());
        }

        self.client
            .delete_collection(name)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to delete collection {name}: {e}")))?;

        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client
            .collection_exists(name)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to check collection {name}: {e}")))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to list collections: {e}")))?;

        Ok(collections
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    async fn upsert_points(&self, collection: &str, points: Vec<PointRecord>) -> Result<()> {
        let points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                let payload: HashMap<String, qdrant_client::qdrant::Value> = p
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, v.into()))
                    .collect();
                PointStruct::new(p.id.to_string(), p.vector, payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points))
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to upsert points: {e}")))?;

        Ok(())
    }

    async fn scroll(&self, collection: &str, limit: usize) -> Result<Vec<StoredPoint>> {
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(collection)
                    .limit(limit as u32)
                    .with_payload(true),
            )
            .await
            .map_err(|e| {
                StoreError::Backend(format!("Failed to scroll collection {collection}: {e}"))
            })?;

        let points = response
            .result
            .into_iter()
            .filter_map(|point| {
                let id = point_id_to_string(point.id?)?;
                Some(StoredPoint {
                    id,
                    payload: payload_to_json(point.payload),
                })
            })
            .collect();

        Ok(points)
    }

    async fn point_count(&self, collection: &str) -> Result<u64> {
        let info = self
            .client
            .collection_info(collection)
            .await
            .map_err(|e| {
                StoreError::Backend(format!("Failed to get collection info for {collection}: {e}"))
            })?;

        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector.to_vec(), limit as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| StoreError::Search(format!("Vector search failed: {e}")))?;

        Ok(results
            .result
            .into_iter()
            .map(|point| SearchHit {
                score: point.score,
                payload: payload_to_json(point.payload),
            })
            .collect())
    }

    async fn set_payload(
        &self,
        collection: &str,
        point_ids: &[String],
        patch: JsonMap,
    ) -> Result<()> {
        let ids: Vec<PointId> = point_ids.iter().map(|id| id.clone().into()).collect();

        let payload: HashMap<String, qdrant_client::qdrant::Value> =
            patch.into_iter().map(|(k, v)| (k, v.into())).collect();

        self.client
            .set_payload(
                SetPayloadPointsBuilder::new(collection, payload)
                    .points_selector(PointsIdsList { ids }),
            )
            .await
            .map_err(|e| {
                StoreError::Backend(format!("Failed to set payload in {collection}: {e}"))
            })?;

        Ok(())
    }
}

fn point_id_to_string(id: PointId) -> Option<String> {
    match id.point_id_options? {
        PointIdOptions::Uuid(uuid) => Some(uuid),
        PointIdOptions::Num(num) => Some(num.to_string()),
    }
}

fn payload_to_json(payload: HashMap<String, qdrant_client::qdrant::Value>) -> JsonMap {
    payload
        .into_iter()
        .map(|(k, v)| (k, value_to_json(v)))
        .collect()
}

fn value_to_json(value: qdrant_client::qdrant::Value) -> serde_json::Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_round_trip_through_qdrant_types() {
        let original = json!({
            "protocol_id": "p1",
            "chunk_index": 3,
            "chunk_size": 42,
            "score_hint": 0.5,
            "flags": [true, false],
            "nested": {"a": "b"},
        });

        let qdrant_value: qdrant_client::qdrant::Value = original.clone().into();
        assert_eq!(value_to_json(qdrant_value), original);
    }

    #[test]
    fn test_new_requires_url() {
        let config = QdrantConfig::default();
        assert!(QdrantBackend::new(&config).is_err());
    }
}
