//! Append-only document version storage backed by redb.

use super::retry::{with_fresh_ids, Attempt};
use super::tables::DOCUMENTS;
use super::time_util::{unix_timestamp_seconds, Clock};
use super::webhook::remove_webhooks_in_txn;
use super::StoreOptions;
use crate::error::AppError;
use crate::models::document::{Document, DocumentVersion, StoredDocument};
use crate::models::webhook::Webhook;
use crate::naming::IdSource;
use redb::{ReadableDatabase, ReadableTable};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Accessor for the `documents` table.
///
/// Every write is a new `(id, version)` row; rows are never rewritten in place.
pub struct DocumentStore {
    db: Arc<redb::Database>,
    ids: Arc<dyn IdSource>,
    clock: Arc<dyn Clock>,
    max_document_size: usize,
}

fn decode_row(id: &str, version: u64, raw: &[u8]) -> Result<Document, AppError> {
    let stored: StoredDocument = bincode::deserialize(raw)?;
    Ok(stored.into_document(id, version))
}

/// All versions of `id`, oldest first.
pub(super) fn versions_in<T>(table: &T, id: &str) -> Result<Vec<Document>, AppError>
where
    T: ReadableTable<(&'static str, u64), &'static [u8]>,
{
    let mut versions = Vec::new();
    for item in table.range((id, 0u64)..=(id, u64::MAX))? {
        let (key, value) = item?;
        let (_, version) = key.value();
        versions.push(decode_row(id, version, value.value())?);
    }
    Ok(versions)
}

fn latest_in<T>(table: &T, id: &str) -> Result<Option<Document>, AppError>
where
    T: ReadableTable<(&'static str, u64), &'static [u8]>,
{
    let mut range = table.range((id, 0u64)..=(id, u64::MAX))?;
    let Some(item) = range.next_back() else {
        return Ok(None);
    };
    let (key, value) = item?;
    let (_, version) = key.value();
    Ok(Some(decode_row(id, version, value.value())?))
}

pub(super) fn has_rows<T>(table: &T, id: &str) -> Result<bool, AppError>
where
    T: ReadableTable<(&'static str, u64), &'static [u8]>,
{
    let mut range = table.range((id, 0u64)..=(id, u64::MAX))?;
    match range.next() {
        Some(item) => {
            item?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Remove every version of `id` plus its webhooks inside `write_txn`.
///
/// # Returns
/// The latest removed version and the removed webhooks.
///
/// # Errors
/// Returns [`AppError::NotFound`] when no version exists.
pub(super) fn remove_document_in_txn(
    write_txn: &redb::WriteTransaction,
    id: &str,
) -> Result<(Document, Vec<Webhook>), AppError> {
    let mut documents = write_txn.open_table(DOCUMENTS)?;
    let versions = versions_in(&documents, id)?;
    let Some(latest) = versions.last().cloned() else {
        return Err(AppError::NotFound);
    };
    for document in &versions {
        let _ = documents.remove((id, document.version))?;
    }
    let webhooks = remove_webhooks_in_txn(write_txn, id)?;
    Ok((latest, webhooks))
}

/// Remove one version inside `write_txn`; the last version takes the
/// document's webhooks with it.
///
/// # Errors
/// Returns [`AppError::NotFound`] when that version does not exist.
pub(super) fn remove_version_in_txn(
    write_txn: &redb::WriteTransaction,
    id: &str,
    version: u64,
) -> Result<(Document, Vec<Webhook>), AppError> {
    let mut documents = write_txn.open_table(DOCUMENTS)?;
    let document = {
        let Some(old) = documents.remove((id, version))? else {
            return Err(AppError::NotFound);
        };
        decode_row(id, version, old.value())?
    };
    let webhooks = if has_rows(&documents, id)? {
        Vec::new()
    } else {
        remove_webhooks_in_txn(write_txn, id)?
    };
    Ok((document, webhooks))
}

impl DocumentStore {
    /// Initialize the documents table if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>, options: StoreOptions) -> Result<Self, AppError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(DOCUMENTS)?;
        write_txn.commit()?;
        Ok(Self {
            db,
            ids: options.ids,
            clock: options.clock,
            max_document_size: options.max_document_size,
        })
    }

    fn now_seconds(&self) -> Result<u64, AppError> {
        unix_timestamp_seconds(self.clock.now())
    }

    fn check_size(&self, content: &str) -> Result<(), AppError> {
        if self.max_document_size > 0 && content.chars().count() > self.max_document_size {
            return Err(AppError::Validation(format!(
                "Document exceeds maximum size of {} characters",
                self.max_document_size
            )));
        }
        Ok(())
    }

    /// Create a document under a fresh random id.
    ///
    /// A generated id collides when any version row already uses it; the
    /// attempt is rolled back and retried with a new id.
    ///
    /// # Returns
    /// The stored first version.
    ///
    /// # Errors
    /// Returns [`AppError::Validation`] for oversized content and
    /// [`AppError::Conflict`] when every id attempt collided.
    pub fn create_document(&self, content: &str, language: &str) -> Result<Document, AppError> {
        self.check_size(content)?;
        let version = self.now_seconds()?;
        let encoded = bincode::serialize(&StoredDocument {
            content: content.to_string(),
            language: language.to_string(),
        })?;

        let document = with_fresh_ids(self.ids.as_ref(), "document", |id| {
            let write_txn = self.db.begin_write()?;
            {
                let mut documents = write_txn.open_table(DOCUMENTS)?;
                if has_rows(&documents, &id)? {
                    return Ok(Attempt::Collision);
                }
                documents.insert((id.as_str(), version), encoded.as_slice())?;
            }
            write_txn.commit()?;
            Ok(Attempt::Inserted(Document {
                id,
                version,
                content: content.to_string(),
                language: language.to_string(),
            }))
        })?;

        tracing::debug!(id = %document.id, version, "Created document");
        Ok(document)
    }

    /// Append a new version for an existing document.
    ///
    /// # Returns
    /// The new version row.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when `id` has no versions and
    /// [`AppError::Conflict`] when the current second is not newer than the
    /// latest stored version.
    pub fn update_document(
        &self,
        id: &str,
        content: &str,
        language: &str,
    ) -> Result<Document, AppError> {
        self.check_size(content)?;
        let version = self.now_seconds()?;
        let encoded = bincode::serialize(&StoredDocument {
            content: content.to_string(),
            language: language.to_string(),
        })?;

        let write_txn = self.db.begin_write()?;
        {
            let mut documents = write_txn.open_table(DOCUMENTS)?;
            let Some(latest) = latest_in(&documents, id)? else {
                return Err(AppError::NotFound);
            };
            if version <= latest.version {
                return Err(AppError::Conflict(format!(
                    "Document '{}' already has version {}; retry the update",
                    id, latest.version
                )));
            }
            documents.insert((id, version), encoded.as_slice())?;
        }
        write_txn.commit()?;

        tracing::debug!(id, version, "Appended document version");
        Ok(Document {
            id: id.to_string(),
            version,
            content: content.to_string(),
            language: language.to_string(),
        })
    }

    /// Fetch the latest version of a document.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when `id` has no versions.
    pub fn get_document(&self, id: &str) -> Result<Document, AppError> {
        let read_txn = self.db.begin_read()?;
        let documents = read_txn.open_table(DOCUMENTS)?;
        latest_in(&documents, id)?.ok_or(AppError::NotFound)
    }

    /// Fetch one exact version.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when that version does not exist.
    pub fn get_document_version(&self, id: &str, version: u64) -> Result<Document, AppError> {
        let read_txn = self.db.begin_read()?;
        let documents = read_txn.open_table(DOCUMENTS)?;
        let Some(value) = documents.get((id, version))? else {
            return Err(AppError::NotFound);
        };
        decode_row(id, version, value.value())
    }

    /// List all versions of a document, newest first.
    ///
    /// # Arguments
    /// - `id`: Document id.
    /// - `with_content`: Include content and language in each entry.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when `id` has no versions.
    pub fn get_document_versions(
        &self,
        id: &str,
        with_content: bool,
    ) -> Result<Vec<DocumentVersion>, AppError> {
        let read_txn = self.db.begin_read()?;
        let documents = read_txn.open_table(DOCUMENTS)?;
        let versions = versions_in(&documents, id)?;
        if versions.is_empty() {
            return Err(AppError::NotFound);
        }
        Ok(versions
            .iter()
            .rev()
            .map(|document| document.to_version(with_content))
            .collect())
    }

    /// Number of stored versions for `id` (zero when unknown).
    pub fn get_version_count(&self, id: &str) -> Result<usize, AppError> {
        let read_txn = self.db.begin_read()?;
        let documents = read_txn.open_table(DOCUMENTS)?;
        let mut count = 0;
        for item in documents.range((id, 0u64)..=(id, u64::MAX))? {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Delete every version of a document and its webhooks.
    ///
    /// Use [`crate::db::TransactionOps::delete_document_with_webhooks`] when the
    /// removed webhooks must still be notified.
    ///
    /// # Returns
    /// The latest deleted version.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when `id` has no versions.
    pub fn delete_document(&self, id: &str) -> Result<Document, AppError> {
        let write_txn = self.db.begin_write()?;
        let (document, webhooks) = remove_document_in_txn(&write_txn, id)?;
        write_txn.commit()?;
        if !webhooks.is_empty() {
            tracing::debug!(id, count = webhooks.len(), "Removed webhooks with document");
        }
        Ok(document)
    }

    /// Delete a single version.
    ///
    /// Removing the last remaining version also removes the document's webhooks.
    ///
    /// # Returns
    /// The deleted version.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when that version does not exist.
    pub fn delete_document_version(&self, id: &str, version: u64) -> Result<Document, AppError> {
        let write_txn = self.db.begin_write()?;
        let (document, webhooks) = remove_version_in_txn(&write_txn, id, version)?;
        write_txn.commit()?;
        if !webhooks.is_empty() {
            tracing::debug!(id, count = webhooks.len(), "Removed webhooks with last version");
        }
        Ok(document)
    }

    /// Hard-delete every version older than `now - expire_after`.
    ///
    /// Documents left without versions lose their webhooks in the same
    /// transaction. A zero `expire_after` disables expiry.
    ///
    /// # Returns
    /// Number of version rows deleted.
    ///
    /// # Errors
    /// Returns an error when storage access fails.
    pub fn delete_expired_documents(&self, expire_after: Duration) -> Result<usize, AppError> {
        self.sweep_expired(expire_after, None)
    }

    /// Like [`DocumentStore::delete_expired_documents`], giving up at `deadline`.
    ///
    /// The deadline is checked between row visits. Once it passes, the write
    /// transaction is dropped uncommitted, so a sweep is all or nothing.
    ///
    /// # Errors
    /// Returns [`AppError::Transient`] when the deadline passes, or a storage
    /// error.
    pub fn delete_expired_documents_before(
        &self,
        expire_after: Duration,
        deadline: Instant,
    ) -> Result<usize, AppError> {
        self.sweep_expired(expire_after, Some(deadline))
    }

    fn sweep_expired(
        &self,
        expire_after: Duration,
        deadline: Option<Instant>,
    ) -> Result<usize, AppError> {
        if expire_after.is_zero() {
            return Ok(0);
        }
        let cutoff = self.now_seconds()?.saturating_sub(expire_after.as_secs());
        let check_deadline = || match deadline {
            Some(deadline) if Instant::now() >= deadline => Err(AppError::Transient(
                "Expiry sweep passed its deadline; rolled back".to_string(),
            )),
            _ => Ok(()),
        };

        let write_txn = self.db.begin_write()?;
        let deleted = {
            let mut documents = write_txn.open_table(DOCUMENTS)?;
            let mut expired: Vec<(String, u64)> = Vec::new();
            for item in documents.iter()? {
                check_deadline()?;
                let (key, _) = item?;
                let (id, version) = key.value();
                if version < cutoff {
                    expired.push((id.to_string(), version));
                }
            }
            for (id, version) in &expired {
                check_deadline()?;
                let _ = documents.remove((id.as_str(), *version))?;
            }

            let touched: BTreeSet<&str> = expired.iter().map(|(id, _)| id.as_str()).collect();
            for id in touched {
                check_deadline()?;
                if !has_rows(&documents, id)? {
                    remove_webhooks_in_txn(&write_txn, id)?;
                }
            }
            expired.len()
        };
        write_txn.commit()?;

        if deleted > 0 {
            tracing::info!(deleted, cutoff, "Deleted expired document versions");
        }
        Ok(deleted)
    }
}
