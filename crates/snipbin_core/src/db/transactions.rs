//! Atomic cross-table operations for deletes that must notify webhooks.

use super::document::{remove_document_in_txn, remove_version_in_txn};
use super::Database;
use crate::error::AppError;
use crate::models::document::Document;
use crate::models::webhook::Webhook;

/// Atomic operations that update document and webhook rows together.
pub struct TransactionOps;

impl TransactionOps {
    /// Atomically delete a document and detach all of its webhooks.
    ///
    /// # Arguments
    /// - `db`: Open database handle.
    /// - `id`: Document id.
    ///
    /// # Returns
    /// The latest deleted version and the webhooks that were subscribed, so
    /// the caller can deliver a final `delete` event.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when the document has no versions.
    pub fn delete_document_with_webhooks(
        db: &Database,
        id: &str,
    ) -> Result<(Document, Vec<Webhook>), AppError> {
        let write_txn = db.db.begin_write()?;
        let removed = remove_document_in_txn(&write_txn, id)?;
        write_txn.commit()?;
        tracing::debug!(id, webhooks = removed.1.len(), "Deleted document");
        Ok(removed)
    }

    /// Atomically delete one version, detaching webhooks if it was the last.
    ///
    /// # Returns
    /// The deleted version and any detached webhooks (empty unless the
    /// document is now gone).
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when that version does not exist.
    pub fn delete_version_with_webhooks(
        db: &Database,
        id: &str,
        version: u64,
    ) -> Result<(Document, Vec<Webhook>), AppError> {
        let write_txn = db.db.begin_write()?;
        let removed = remove_version_in_txn(&write_txn, id, version)?;
        write_txn.commit()?;
        Ok(removed)
    }
}
