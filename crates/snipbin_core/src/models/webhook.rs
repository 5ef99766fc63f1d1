//! Webhook subscription models.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Document lifecycle event a webhook can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookEvent {
    Update,
    Delete,
}

impl WebhookEvent {
    pub const ALL: [WebhookEvent; 2] = [WebhookEvent::Update, WebhookEvent::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            WebhookEvent::Update => "update",
            WebhookEvent::Delete => "delete",
        }
    }
}

impl fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEvent {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        WebhookEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("Unknown webhook event '{}'", value)))
    }
}

/// Parse event strings into an ordered, de-duplicated set.
///
/// # Errors
/// Returns [`AppError::Validation`] for strings outside the event vocabulary.
pub fn parse_events<S: AsRef<str>>(values: &[S]) -> Result<Vec<WebhookEvent>, AppError> {
    let mut events = values
        .iter()
        .map(|value| value.as_ref().trim().parse())
        .collect::<Result<Vec<WebhookEvent>, AppError>>()?;
    events.sort_unstable();
    events.dedup();
    Ok(events)
}

/// Webhook subscription stored per document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: String,
    pub document_id: String,
    pub url: String,
    pub secret: String,
    pub events: Vec<WebhookEvent>,
}

impl Webhook {
    pub fn subscribes_to(&self, event: WebhookEvent) -> bool {
        self.events.contains(&event)
    }
}

/// Partial update for a webhook.
///
/// `secret` authorizes the change. Empty `new_*` values leave the stored field
/// unchanged.
#[derive(Debug, Clone, Default)]
pub struct WebhookUpdate {
    pub id: String,
    pub document_id: String,
    pub secret: String,
    pub new_url: String,
    pub new_secret: String,
    pub new_events: Vec<WebhookEvent>,
}

impl WebhookUpdate {
    pub(crate) fn apply(&self, webhook: &mut Webhook) {
        if !self.new_url.is_empty() {
            webhook.url = self.new_url.clone();
        }
        if !self.new_secret.is_empty() {
            webhook.secret = self.new_secret.clone();
        }
        if !self.new_events.is_empty() {
            webhook.events = self.new_events.clone();
        }
    }
}

/// Request payload for creating a webhook.
#[derive(Debug, Deserialize)]
pub struct CreateWebhookRequest {
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
}

/// Request payload for patching a webhook; absent fields map to "unchanged".
#[derive(Debug, Default, Deserialize)]
pub struct UpdateWebhookRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub events: Vec<String>,
}

/// Webhook as returned to API callers; the secret is never echoed back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub id: String,
    pub document_id: String,
    pub url: String,
    pub events: Vec<WebhookEvent>,
}

impl From<&Webhook> for WebhookResponse {
    fn from(value: &Webhook) -> Self {
        Self {
            id: value.id.clone(),
            document_id: value.document_id.clone(),
            url: value.url.clone(),
            events: value.events.clone(),
        }
    }
}
