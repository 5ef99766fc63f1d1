//! Webhook management handlers.
//!
//! Creation needs a `write` share token; everything after that is authorized
//! by the webhook's own secret.

use super::auth::{require_permission, webhook_secret, TokenQuery};
use crate::{error::HttpError, AppState};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use snipbin_core::models::permission::Permission;
use snipbin_core::models::webhook::*;

pub async fn create_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(auth): Query<TokenQuery>,
    headers: HeaderMap,
    Json(req): Json<CreateWebhookRequest>,
) -> Result<impl IntoResponse, HttpError> {
    require_permission(&state, &headers, &auth, &id, Permission::Write)?;
    let events = parse_events(&req.events)?;
    let webhook = state
        .db
        .webhooks
        .create_webhook(&id, req.url.trim(), &req.secret, &events)?;
    tracing::info!(document_id = %id, webhook_id = %webhook.id, "Created webhook");
    Ok((StatusCode::CREATED, Json(WebhookResponse::from(&webhook))))
}

pub async fn get_webhook(
    State(state): State<AppState>,
    Path((id, webhook_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<WebhookResponse>, HttpError> {
    let secret = webhook_secret(&headers)?;
    let webhook = state.db.webhooks.get_webhook(&id, &webhook_id, &secret)?;
    Ok(Json(WebhookResponse::from(&webhook)))
}

/// Patch a webhook; empty or absent fields are left unchanged.
pub async fn update_webhook(
    State(state): State<AppState>,
    Path((id, webhook_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<UpdateWebhookRequest>,
) -> Result<Json<WebhookResponse>, HttpError> {
    let secret = webhook_secret(&headers)?;
    let events = parse_events(&req.events)?;
    let webhook = state.db.webhooks.update_webhook(
        &id,
        &webhook_id,
        &secret,
        req.url.trim(),
        &req.secret,
        &events,
    )?;
    Ok(Json(WebhookResponse::from(&webhook)))
}

pub async fn delete_webhook(
    State(state): State<AppState>,
    Path((id, webhook_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, HttpError> {
    let secret = webhook_secret(&headers)?;
    state.db.webhooks.delete_webhook(&id, &webhook_id, &secret)?;
    Ok(StatusCode::NO_CONTENT)
}
