//! Fire-and-forget webhook delivery.
//!
//! Every delivery runs in its own task registered on a [`TaskTracker`], so
//! shutdown can wait for in-flight calls without cancelling them.

use crate::db::WebhookRegistry;
use crate::error::AppError;
use crate::models::document::Document;
use crate::models::webhook::{Webhook, WebhookEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::task::TaskTracker;

/// Header naming the event kind of a delivery.
pub const EVENT_HEADER: &str = "X-Snipbin-Event";
/// Header carrying the receiving webhook's id.
pub const WEBHOOK_ID_HEADER: &str = "X-Snipbin-Webhook-Id";
/// Header carrying `blake3=<hex>` over the request body.
pub const SIGNATURE_HEADER: &str = "X-Snipbin-Signature";

const SIGNATURE_PREFIX: &str = "blake3=";
const SIGNATURE_KEY_CONTEXT: &str = "snipbin 2024-01-01 webhook signature v1";

/// Document snapshot embedded in a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDocument {
    pub id: String,
    pub version: u64,
    pub language: String,
    pub content: String,
}

/// JSON body POSTed to a subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventPayload {
    pub webhook_id: String,
    pub event: WebhookEvent,
    pub created_at: DateTime<Utc>,
    pub document: WebhookDocument,
}

impl WebhookEventPayload {
    fn new(webhook: &Webhook, event: WebhookEvent, document: &Document) -> Self {
        Self {
            webhook_id: webhook.id.clone(),
            event,
            created_at: Utc::now(),
            document: WebhookDocument {
                id: document.id.clone(),
                version: document.version,
                language: document.language.clone(),
                content: document.content.clone(),
            },
        }
    }
}

fn signing_key(secret: &str) -> [u8; 32] {
    blake3::derive_key(SIGNATURE_KEY_CONTEXT, secret.as_bytes())
}

/// Signature header value for `body` under a webhook secret.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let digest = blake3::keyed_hash(&signing_key(secret), body);
    format!("{}{}", SIGNATURE_PREFIX, digest.to_hex())
}

/// Check a received `X-Snipbin-Signature` value against `body`.
///
/// The comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> bool {
    let Some(hex) = header_value.trim().strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(presented) = blake3::Hash::from_hex(hex) else {
        return false;
    };
    presented == blake3::keyed_hash(&signing_key(secret), body)
}

/// Sends webhook events in tracked background tasks.
#[derive(Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    tracker: TaskTracker,
}

impl WebhookDispatcher {
    /// Build a dispatcher whose deliveries are each bounded by `timeout`.
    ///
    /// # Errors
    /// Returns [`AppError::Transient`] when the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("snipbin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| AppError::Transient(format!("Failed to build webhook client: {}", err)))?;
        Ok(Self {
            client,
            tracker: TaskTracker::new(),
        })
    }

    /// Post-mutation hook: look up subscribers of `document` and deliver.
    ///
    /// Lookup failures are logged, never returned; the mutation already
    /// committed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn notify(&self, registry: &WebhookRegistry, event: WebhookEvent, document: &Document) {
        match registry.get_webhooks_by_document_id(&document.id) {
            Ok(webhooks) => {
                self.dispatch_to(event, document, webhooks);
            }
            Err(err) => {
                tracing::error!(
                    document_id = %document.id,
                    %event,
                    "Failed to load webhooks for dispatch: {}",
                    err
                );
            }
        }
    }

    /// Deliver `event` to every webhook in `webhooks` that subscribes to it.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Returns
    /// Number of deliveries scheduled.
    pub fn dispatch_to(
        &self,
        event: WebhookEvent,
        document: &Document,
        webhooks: Vec<Webhook>,
    ) -> usize {
        let mut scheduled = 0;
        for webhook in webhooks {
            if !webhook.subscribes_to(event) {
                continue;
            }
            let payload = WebhookEventPayload::new(&webhook, event, document);
            let body = match serde_json::to_vec(&payload) {
                Ok(body) => body,
                Err(err) => {
                    tracing::error!(webhook_id = %webhook.id, "Failed to encode webhook payload: {}", err);
                    continue;
                }
            };
            let client = self.client.clone();
            self.tracker.spawn(deliver(client, webhook, event, body));
            scheduled += 1;
        }
        scheduled
    }

    /// Deliveries still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every scheduled delivery has finished.
    ///
    /// Deliveries are never cancelled; each is bounded by the client timeout.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

async fn deliver(client: reqwest::Client, webhook: Webhook, event: WebhookEvent, body: Vec<u8>) {
    let signature = sign_payload(&webhook.secret, &body);
    let result = client
        .post(&webhook.url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header(EVENT_HEADER, event.as_str())
        .header(WEBHOOK_ID_HEADER, webhook.id.as_str())
        .header(SIGNATURE_HEADER, signature)
        .body(body)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            tracing::debug!(webhook_id = %webhook.id, %event, "Delivered webhook");
        }
        Ok(response) => {
            tracing::warn!(
                webhook_id = %webhook.id,
                url = %webhook.url,
                status = %response.status(),
                "Webhook receiver rejected delivery"
            );
        }
        Err(err) => {
            tracing::warn!(
                webhook_id = %webhook.id,
                url = %webhook.url,
                timeout = err.is_timeout(),
                "Webhook delivery failed: {}",
                err
            );
        }
    }
}
