//! Document endpoints: public lookup and raw reads/writes.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use super::{success, ApiResult};
use crate::errors::{SyncError, DOCUMENT_NOT_FOUND};
use crate::hooks::{PublicDocumentHook, PublicDocumentParams};
use crate::models::DocumentRecord;
use crate::store::RawDocument;
use crate::subscription::Phase;
use crate::AppState;

/// How long the gateway waits for a public lookup before giving up.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// GET /api/documents/public/:token - Resolve a public share token.
pub async fn get_public_document(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<DocumentRecord> {
    let mut hook = PublicDocumentHook::open(
        state.store.clone(),
        PublicDocumentParams::new(Some(&token)),
    );

    let outcome = tokio::time::timeout(LOOKUP_TIMEOUT, hook.settle())
        .await
        .map_err(|_| SyncError::Stream("Document lookup timed out".to_string()))?;

    match hook.phase() {
        Phase::Found => hook
            .document()
            .map(success)
            .unwrap_or_else(|| Err(SyncError::NotFound(DOCUMENT_NOT_FOUND.to_string()))),
        Phase::NotFound => Err(SyncError::NotFound(DOCUMENT_NOT_FOUND.to_string())),
        Phase::Idle => Err(SyncError::BadRequest("Token is required".to_string())),
        _ => Err(SyncError::Stream(
            outcome
                .error
                .unwrap_or_else(|| "Document lookup failed".to_string()),
        )),
    }
}

/// GET /api/collections/:collection/documents/:id - Get a raw document.
pub async fn get_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<RawDocument> {
    validate_collection(&collection)?;

    match state.store.get_document(&collection, &id).await? {
        Some(doc) => success(doc),
        None => Err(SyncError::NotFound(format!(
            "Document {}/{} not found",
            collection, id
        ))),
    }
}

/// POST /api/collections/:collection/documents - Create a document with a generated id.
pub async fn create_document(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(fields): Json<Value>,
) -> ApiResult<RawDocument> {
    validate_collection(&collection)?;
    let doc = RawDocument::from_value("", fields)?;

    success(state.store.create_document(&collection, doc.fields).await?)
}

/// PUT /api/collections/:collection/documents/:id - Create or replace a document.
pub async fn put_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(fields): Json<Value>,
) -> ApiResult<RawDocument> {
    validate_collection(&collection)?;
    let doc = RawDocument::from_value(id, fields)?;

    success(
        state
            .store
            .put_document(&collection, &doc.id, doc.fields)
            .await?,
    )
}

/// DELETE /api/collections/:collection/documents/:id - Delete a document.
pub async fn delete_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<()> {
    validate_collection(&collection)?;

    if state.store.delete_document(&collection, &id).await? {
        success(())
    } else {
        Err(SyncError::NotFound(format!(
            "Document {}/{} not found",
            collection, id
        )))
    }
}

fn validate_collection(collection: &str) -> Result<(), SyncError> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(SyncError::BadRequest(format!(
            "Invalid collection name '{}'",
            collection
        )))
    }
}
