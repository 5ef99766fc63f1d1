//! Webhook subscription storage backed by redb.

use super::document::has_rows;
use super::retry::{with_fresh_ids, Attempt};
use super::tables::{DOCUMENTS, WEBHOOKS, WEBHOOKS_BY_DOCUMENT};
use super::StoreOptions;
use crate::error::AppError;
use crate::models::webhook::{Webhook, WebhookEvent, WebhookUpdate};
use crate::naming::IdSource;
use redb::{ReadableDatabase, ReadableTable};
use std::sync::Arc;

/// Accessor for the webhook tables.
///
/// The webhook secret doubles as the management credential: reads, updates and
/// deletes of a single webhook must present it.
pub struct WebhookRegistry {
    db: Arc<redb::Database>,
    ids: Arc<dyn IdSource>,
}

fn decode_webhook(raw: &[u8]) -> Result<Webhook, AppError> {
    Ok(bincode::deserialize(raw)?)
}

// blake3::Hash equality is constant-time.
fn secrets_match(presented: &str, stored: &str) -> bool {
    blake3::hash(presented.as_bytes()) == blake3::hash(stored.as_bytes())
}

fn validate_url(url: &str) -> Result<(), AppError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|err| AppError::Validation(format!("Invalid webhook url '{}': {}", url, err)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(AppError::Validation(format!(
            "Webhook url must use http or https, got '{}'",
            other
        ))),
    }
}

fn webhook_ids_for<T>(index: &T, document_id: &str) -> Result<Vec<String>, AppError>
where
    T: ReadableTable<(&'static str, &'static str), ()>,
{
    let mut ids = Vec::new();
    for item in index.range((document_id, "")..)? {
        let (key, _) = item?;
        let (owner, webhook_id) = key.value();
        if owner != document_id {
            break;
        }
        ids.push(webhook_id.to_string());
    }
    Ok(ids)
}

/// Load a webhook that belongs to `document_id` and check its secret.
fn load_authorized<T>(
    webhooks: &T,
    document_id: &str,
    webhook_id: &str,
    secret: &str,
) -> Result<Webhook, AppError>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let Some(raw) = webhooks.get(webhook_id)? else {
        return Err(AppError::NotFound);
    };
    let webhook = decode_webhook(raw.value())?;
    if webhook.document_id != document_id {
        return Err(AppError::NotFound);
    }
    if !secrets_match(secret, &webhook.secret) {
        return Err(AppError::Unauthorized(
            "Webhook secret does not match".to_string(),
        ));
    }
    Ok(webhook)
}

/// Remove every webhook of `document_id` inside `write_txn`.
///
/// # Returns
/// The removed webhooks.
pub(super) fn remove_webhooks_in_txn(
    write_txn: &redb::WriteTransaction,
    document_id: &str,
) -> Result<Vec<Webhook>, AppError> {
    let mut webhooks = write_txn.open_table(WEBHOOKS)?;
    let mut index = write_txn.open_table(WEBHOOKS_BY_DOCUMENT)?;

    let ids = webhook_ids_for(&index, document_id)?;
    let mut removed = Vec::with_capacity(ids.len());
    for webhook_id in &ids {
        let _ = index.remove((document_id, webhook_id.as_str()))?;
        let webhook = match webhooks.remove(webhook_id.as_str())? {
            Some(raw) => decode_webhook(raw.value())?,
            None => {
                tracing::warn!(document_id, webhook_id, "Webhook index row without webhook");
                continue;
            }
        };
        removed.push(webhook);
    }
    Ok(removed)
}

impl WebhookRegistry {
    /// Initialize webhook tables if they do not exist yet.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>, options: StoreOptions) -> Result<Self, AppError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(WEBHOOKS)?;
        write_txn.open_table(WEBHOOKS_BY_DOCUMENT)?;
        write_txn.commit()?;
        Ok(Self {
            db,
            ids: options.ids,
        })
    }

    /// Subscribe `url` to events of an existing document.
    ///
    /// # Returns
    /// The stored webhook with its generated id.
    ///
    /// # Errors
    /// Returns [`AppError::Validation`] for a bad url, empty secret or empty
    /// event set, [`AppError::NotFound`] when the document does not exist, and
    /// [`AppError::Conflict`] when every id attempt collided.
    pub fn create_webhook(
        &self,
        document_id: &str,
        url: &str,
        secret: &str,
        events: &[WebhookEvent],
    ) -> Result<Webhook, AppError> {
        validate_url(url)?;
        if secret.is_empty() {
            return Err(AppError::Validation(
                "Webhook secret must not be empty".to_string(),
            ));
        }
        if events.is_empty() {
            return Err(AppError::Validation(
                "Webhook must subscribe to at least one event".to_string(),
            ));
        }
        let mut events = events.to_vec();
        events.sort_unstable();
        events.dedup();

        let webhook = with_fresh_ids(self.ids.as_ref(), "webhook", |id| {
            let webhook = Webhook {
                id,
                document_id: document_id.to_string(),
                url: url.to_string(),
                secret: secret.to_string(),
                events: events.clone(),
            };
            let encoded = bincode::serialize(&webhook)?;

            let write_txn = self.db.begin_write()?;
            {
                let documents = write_txn.open_table(DOCUMENTS)?;
                if !has_rows(&documents, document_id)? {
                    return Err(AppError::NotFound);
                }
                let mut webhooks = write_txn.open_table(WEBHOOKS)?;
                let mut index = write_txn.open_table(WEBHOOKS_BY_DOCUMENT)?;
                if webhooks.get(webhook.id.as_str())?.is_some() {
                    return Ok(Attempt::Collision);
                }
                webhooks.insert(webhook.id.as_str(), encoded.as_slice())?;
                index.insert((document_id, webhook.id.as_str()), ())?;
            }
            write_txn.commit()?;
            Ok(Attempt::Inserted(webhook))
        })?;

        tracing::debug!(document_id, webhook_id = %webhook.id, "Created webhook");
        Ok(webhook)
    }

    /// Fetch one webhook, authorized by its secret.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when the webhook does not exist for this
    /// document and [`AppError::Unauthorized`] on a secret mismatch.
    pub fn get_webhook(
        &self,
        document_id: &str,
        webhook_id: &str,
        secret: &str,
    ) -> Result<Webhook, AppError> {
        let read_txn = self.db.begin_read()?;
        let webhooks = read_txn.open_table(WEBHOOKS)?;
        load_authorized(&webhooks, document_id, webhook_id, secret)
    }

    /// List all webhooks of a document (empty when there are none).
    pub fn get_webhooks_by_document_id(&self, document_id: &str) -> Result<Vec<Webhook>, AppError> {
        let read_txn = self.db.begin_read()?;
        let webhooks = read_txn.open_table(WEBHOOKS)?;
        let index = read_txn.open_table(WEBHOOKS_BY_DOCUMENT)?;

        let mut found = Vec::new();
        for webhook_id in webhook_ids_for(&index, document_id)? {
            if let Some(raw) = webhooks.get(webhook_id.as_str())? {
                found.push(decode_webhook(raw.value())?);
            }
        }
        Ok(found)
    }

    /// Patch a webhook, authorized by its current secret.
    ///
    /// Empty `new_url`, `new_secret` or `new_events` leave the stored value
    /// unchanged.
    ///
    /// # Returns
    /// The webhook after the patch.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`], [`AppError::Unauthorized`], or
    /// [`AppError::Validation`] for a malformed new url.
    pub fn update_webhook(
        &self,
        document_id: &str,
        webhook_id: &str,
        secret: &str,
        new_url: &str,
        new_secret: &str,
        new_events: &[WebhookEvent],
    ) -> Result<Webhook, AppError> {
        let mut new_events = new_events.to_vec();
        new_events.sort_unstable();
        new_events.dedup();
        self.apply_update(&WebhookUpdate {
            id: webhook_id.to_string(),
            document_id: document_id.to_string(),
            secret: secret.to_string(),
            new_url: new_url.to_string(),
            new_secret: new_secret.to_string(),
            new_events,
        })
    }

    /// Apply a [`WebhookUpdate`] patch.
    ///
    /// # Errors
    /// See [`WebhookRegistry::update_webhook`].
    pub fn apply_update(&self, update: &WebhookUpdate) -> Result<Webhook, AppError> {
        if !update.new_url.is_empty() {
            validate_url(&update.new_url)?;
        }

        let write_txn = self.db.begin_write()?;
        let webhook = {
            let mut webhooks = write_txn.open_table(WEBHOOKS)?;
            let mut webhook =
                load_authorized(&webhooks, &update.document_id, &update.id, &update.secret)?;
            update.apply(&mut webhook);
            let encoded = bincode::serialize(&webhook)?;
            webhooks.insert(webhook.id.as_str(), encoded.as_slice())?;
            webhook
        };
        write_txn.commit()?;
        Ok(webhook)
    }

    /// Delete one webhook; requires the matching document, id and secret.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] or [`AppError::Unauthorized`].
    pub fn delete_webhook(
        &self,
        document_id: &str,
        webhook_id: &str,
        secret: &str,
    ) -> Result<(), AppError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut webhooks = write_txn.open_table(WEBHOOKS)?;
            let mut index = write_txn.open_table(WEBHOOKS_BY_DOCUMENT)?;
            load_authorized(&webhooks, document_id, webhook_id, secret)?;
            let _ = webhooks.remove(webhook_id)?;
            let _ = index.remove((document_id, webhook_id))?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Atomically fetch and remove every webhook of a document.
    ///
    /// # Returns
    /// Exactly the removed set, so callers can send a final notification.
    pub fn get_and_delete_webhooks_by_document_id(
        &self,
        document_id: &str,
    ) -> Result<Vec<Webhook>, AppError> {
        let write_txn = self.db.begin_write()?;
        let removed = remove_webhooks_in_txn(&write_txn, document_id)?;
        write_txn.commit()?;
        Ok(removed)
    }
}
