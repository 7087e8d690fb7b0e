//! Protocol management handlers
//!
//! Thin glue over the protocol store: soft-absence results map to 404 and
//! `StoreError` maps to a sanitized 500 (see [`crate::error`]).

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use cta_core::{ProtocolMetadata, ProtocolSummary, ScoredChunk};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Protocol ingestion request
#[derive(Debug, Deserialize)]
pub struct IngestProtocolRequest {
    pub study_acronym: String,
    pub protocol_title: String,
    pub file_path: Option<String>,
    /// Pre-chunked document text, in document order
    pub chunks: Vec<String>,
}

/// Protocol list response
#[derive(Debug, Serialize)]
pub struct ProtocolListResponse {
    pub protocols: Vec<ProtocolSummary>,
    pub total: usize,
}

/// Status update request
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Search request
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
}

/// Search response
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<ScoredChunk>,
    pub total: usize,
}

/// Ingest a protocol: create its collection, embed the chunks, and store
/// them with duplicated metadata.
pub async fn ingest_protocol(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestProtocolRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.chunks.is_empty() {
        return Err(AppError::BadRequest(
            "At least one chunk is required".to_string(),
        ));
    }

    let collection_name = state
        .store
        .create_protocol_collection(
            &request.study_acronym,
            &request.protocol_title,
            request.file_path.as_deref(),
        )
        .await?;

    let embeddings = state.store.get_embeddings(&request.chunks).await;

    let mut metadata = ProtocolMetadata::new(
        Uuid::new_v4().to_string(),
        &request.study_acronym,
        &request.protocol_title,
    );
    if let Some(file_path) = request.file_path {
        metadata = metadata.with_file_path(file_path);
    }

    state
        .store
        .store_protocol_with_metadata(&collection_name, &request.chunks, embeddings, &metadata)
        .await?;

    let summary = state
        .store
        .get_protocol_by_collection(&collection_name)
        .await
        .ok_or_else(|| {
            AppError::Internal("Stored protocol could not be read back".to_string())
        })?;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// List all protocols
pub async fn list_protocols(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProtocolListResponse>, AppError> {
    let protocols = state.store.list_all_protocols().await?;
    let total = protocols.len();
    Ok(Json(ProtocolListResponse { protocols, total }))
}

/// Get one protocol by its protocol id
pub async fn get_protocol(
    State(state): State<Arc<AppState>>,
    Path(protocol_id): Path<String>,
) -> Result<Json<ProtocolSummary>, AppError> {
    state
        .store
        .get_protocol_by_id(&protocol_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Protocol {protocol_id}")))
}

/// Get one protocol by its collection name
pub async fn get_protocol_by_collection(
    State(state): State<Arc<AppState>>,
    Path(collection_name): Path<String>,
) -> Result<Json<ProtocolSummary>, AppError> {
    state
        .store
        .get_protocol_by_collection(&collection_name)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Protocol collection {collection_name}")))
}

/// Update the status of every chunk in a protocol collection
pub async fn update_protocol_status(
    State(state): State<Arc<AppState>>,
    Path(collection_name): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let updated = state
        .store
        .update_protocol_status(&collection_name, &request.status)
        .await?;

    if !updated {
        return Err(AppError::NotFound(format!(
            "Protocol collection {collection_name}"
        )));
    }

    Ok(Json(serde_json::json!({
        "collection_name": collection_name,
        "status": request.status,
    })))
}

/// Delete a protocol and its entire collection
pub async fn delete_protocol(
    State(state): State<Arc<AppState>>,
    Path(collection_name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.store.delete_protocol(&collection_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Similarity search within one protocol's collection
pub async fn search_protocol(
    State(state): State<Arc<AppState>>,
    Path(collection_name): Path<String>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let limit = request.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let results = state
        .store
        .search_protocol_documents(&collection_name, &request.query, limit)
        .await?;

    let total = results.len();
    Ok(Json(SearchResponse { results, total }))
}
