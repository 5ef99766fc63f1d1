//! Database layer and transactional helpers for snipbin.

/// Document version storage.
pub mod document;
/// Bounded id-collision retry.
pub(crate) mod retry;
/// redb table definitions.
pub mod tables;
/// Clock abstraction for version stamps.
pub mod time_util;
/// Cross-table atomic operations.
pub mod transactions;
/// Webhook subscription storage.
pub mod webhook;

pub use document::DocumentStore;
pub use time_util::{Clock, ManualClock, SystemClock};
pub use transactions::TransactionOps;
pub use webhook::WebhookRegistry;

use crate::error::AppError;
use crate::naming::{IdSource, RandomIds};
use std::sync::Arc;

/// Tunables shared by the document and webhook stores.
#[derive(Clone)]
pub struct StoreOptions {
    /// Maximum document length in characters; `0` disables the check.
    pub max_document_size: usize,
    pub ids: Arc<dyn IdSource>,
    pub clock: Arc<dyn Clock>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_document_size: 0,
            ids: Arc::new(RandomIds),
            clock: Arc::new(SystemClock),
        }
    }
}

impl std::fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreOptions")
            .field("max_document_size", &self.max_document_size)
            .finish_non_exhaustive()
    }
}

/// Database handle with access to the document and webhook stores.
pub struct Database {
    pub db: Arc<redb::Database>,
    pub documents: DocumentStore,
    pub webhooks: WebhookRegistry,
}

impl Database {
    /// Build a database handle from an existing shared redb instance.
    ///
    /// # Returns
    /// A new [`Database`] wrapper that shares the underlying redb instance.
    ///
    /// # Errors
    /// Returns an error if the required tables cannot be created.
    pub fn from_shared(db: Arc<redb::Database>, options: StoreOptions) -> Result<Self, AppError> {
        Ok(Self {
            documents: DocumentStore::new(db.clone(), options.clone())?,
            webhooks: WebhookRegistry::new(db.clone(), options)?,
            db,
        })
    }

    /// Open the database with default options.
    ///
    /// # Errors
    /// Returns an error if redb cannot open the file or create tables.
    pub fn new(path: &str) -> Result<Self, AppError> {
        Self::open(path, StoreOptions::default())
    }

    /// Open (or create) the redb file at `path` and initialize tables.
    ///
    /// # Returns
    /// A fully initialized [`Database`].
    ///
    /// # Errors
    /// Returns an error if redb cannot open the database or tables.
    pub fn open(path: &str, options: StoreOptions) -> Result<Self, AppError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    AppError::StorageMessage(format!(
                        "Failed to create data directory '{}': {}",
                        parent.display(),
                        err
                    ))
                })?;
            }
        }

        let db = match redb::Database::create(path) {
            Ok(db) => db,
            Err(redb::DatabaseError::DatabaseAlreadyOpen) => {
                return Err(AppError::StorageMessage(format!(
                    "Database '{}' is already open in another snipbin process.\n\
                    Stop it first, or set DB_PATH to use a different database file.",
                    path
                )));
            }
            Err(err) => return Err(err.into()),
        };
        tracing::debug!("Opened database at {}", path);
        Self::from_shared(Arc::new(db), options)
    }
}
