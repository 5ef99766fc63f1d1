//! redb table definitions shared by storage modules.

use redb::TableDefinition;

/// Document version rows keyed by `(id, version)` (`StoredDocument`, bincode-encoded).
pub const DOCUMENTS: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("documents");
/// Webhook rows keyed by webhook id (`Webhook`, bincode-encoded).
pub const WEBHOOKS: TableDefinition<&str, &[u8]> = TableDefinition::new("webhooks");
/// Ownership index keyed by `(document_id, webhook_id)`.
pub const WEBHOOKS_BY_DOCUMENT: TableDefinition<(&str, &str), ()> =
    TableDefinition::new("webhooks_by_document");
