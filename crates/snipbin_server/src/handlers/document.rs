//! Document HTTP handlers.

use super::auth::{optional_permission, require_permission, TokenQuery};
use crate::{error::HttpError, AppError, AppState};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::json;
use snipbin_core::db::TransactionOps;
use snipbin_core::models::document::*;
use snipbin_core::models::permission::{parse_permissions, Permission, ShareRequest, ShareResponse};
use snipbin_core::models::webhook::WebhookEvent;
use snipbin_core::naming::is_valid_id;

/// Response to a create: the first version plus an owner token.
#[derive(Debug, Serialize)]
pub struct CreatedDocument {
    #[serde(flatten)]
    pub document: Document,
    pub token: String,
}

/// Create a new document and mint an all-permission owner token.
///
/// # Returns
/// `201 Created` with the stored document and its token.
///
/// # Errors
/// Returns an error when validation or persistence fails.
pub async fn create_document(
    State(state): State<AppState>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let language = normalize_language(req.language.as_deref());
    let document = state.db.documents.create_document(&req.content, &language)?;
    let token = state.tokens.issue(&document.id, &Permission::ALL)?;
    tracing::info!(id = %document.id, "Created document");
    Ok((StatusCode::CREATED, Json(CreatedDocument { document, token })))
}

/// Fetch the latest version of a document.
///
/// # Errors
/// Returns `404` when the document does not exist.
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, HttpError> {
    if !is_valid_id(&id) {
        return Err(AppError::NotFound.into());
    }
    Ok(Json(state.db.documents.get_document(&id)?))
}

/// Resolve a share link (`/<id>?token=<token>`) to the latest version.
///
/// A token on the link must be a valid `read` token for this document.
///
/// # Errors
/// Returns `404` for a malformed or missing id, and `401`/`403` for a token
/// that does not grant `read` on it.
pub async fn open_share_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(auth): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<Document>, HttpError> {
    if !is_valid_id(&id) {
        return Err(AppError::NotFound.into());
    }
    optional_permission(&state, &headers, &auth, &id, Permission::Read)?;
    Ok(Json(state.db.documents.get_document(&id)?))
}

/// Append a new version and notify `update` subscribers.
///
/// An absent `language` keeps the current one.
///
/// # Errors
/// Returns `401`/`403` without a `write` token, `404` for a missing document,
/// and `409` when a version already exists for the current second.
pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(auth): Query<TokenQuery>,
    headers: HeaderMap,
    Json(req): Json<UpdateDocumentRequest>,
) -> Result<Json<Document>, HttpError> {
    require_permission(&state, &headers, &auth, &id, Permission::Write)?;
    let language = match req.language.as_deref() {
        Some(language) => normalize_language(Some(language)),
        None => state.db.documents.get_document(&id)?.language,
    };
    let document = state
        .db
        .documents
        .update_document(&id, &req.content, &language)?;
    state
        .webhooks
        .notify(&state.db.webhooks, WebhookEvent::Update, &document);
    Ok(Json(document))
}

/// Delete every version of a document and notify `delete` subscribers.
///
/// Subscribers are detached in the same transaction, so the notification goes
/// to exactly the set that was removed.
///
/// # Errors
/// Returns `401`/`403` without a `delete` token and `404` when missing.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(auth): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<Document>, HttpError> {
    require_permission(&state, &headers, &auth, &id, Permission::Delete)?;
    let (document, webhooks) = TransactionOps::delete_document_with_webhooks(&state.db, &id)?;
    state
        .webhooks
        .dispatch_to(WebhookEvent::Delete, &document, webhooks);
    tracing::info!(id = %id, "Deleted document");
    Ok(Json(document))
}

/// List versions newest first; `?with_content=true` includes content.
///
/// # Errors
/// Returns `404` when the document does not exist.
pub async fn list_versions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<VersionsQuery>,
) -> Result<Json<Vec<DocumentVersion>>, HttpError> {
    Ok(Json(
        state
            .db
            .documents
            .get_document_versions(&id, query.with_content)?,
    ))
}

pub async fn count_versions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let count = state.db.documents.get_version_count(&id)?;
    Ok(Json(json!({ "count": count })))
}

pub async fn get_version(
    State(state): State<AppState>,
    Path((id, version)): Path<(String, u64)>,
) -> Result<Json<Document>, HttpError> {
    Ok(Json(state.db.documents.get_document_version(&id, version)?))
}

/// Delete one version.
///
/// Removing the last version deletes the document; its subscribers then get a
/// `delete` event.
///
/// # Errors
/// Returns `401`/`403` without a `delete` token and `404` when missing.
pub async fn delete_version(
    State(state): State<AppState>,
    Path((id, version)): Path<(String, u64)>,
    Query(auth): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<Document>, HttpError> {
    require_permission(&state, &headers, &auth, &id, Permission::Delete)?;
    let (document, webhooks) =
        TransactionOps::delete_version_with_webhooks(&state.db, &id, version)?;
    if !webhooks.is_empty() {
        state
            .webhooks
            .dispatch_to(WebhookEvent::Delete, &document, webhooks);
    }
    Ok(Json(document))
}

/// Issue a token for a subset of the caller's own permissions.
///
/// # Errors
/// Returns `400` for unknown permission names and `403` when the caller lacks
/// `share` or asks for a permission it does not hold.
pub async fn share_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(auth): Query<TokenQuery>,
    headers: HeaderMap,
    Json(req): Json<ShareRequest>,
) -> Result<Json<ShareResponse>, HttpError> {
    let claims = require_permission(&state, &headers, &auth, &id, Permission::Share)?;
    let requested = parse_permissions(&req.permissions)?;
    if let Some(missing) = requested.iter().find(|p| !claims.allows(**p)) {
        return Err(HttpError::forbidden(format!(
            "Cannot grant '{}' without holding it",
            missing
        )));
    }
    // Shared tokens are only handed out for documents that exist.
    state.db.documents.get_document(&id)?;
    let token = state.tokens.issue(&id, &requested)?;
    Ok(Json(ShareResponse { token }))
}
