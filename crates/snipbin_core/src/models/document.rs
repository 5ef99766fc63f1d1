//! Document data models.

use serde::{Deserialize, Serialize};

/// One stored version of a document.
///
/// `version` is the creation time of this row in unix seconds. The current
/// document for an id is the row with the largest version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub version: u64,
    pub content: String,
    pub language: String,
}

/// Entry of a version listing.
///
/// `content` and `language` are `None` for lightweight listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Value half of a `documents` row; the key carries `(id, version)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredDocument {
    pub content: String,
    pub language: String,
}

impl StoredDocument {
    pub(crate) fn into_document(self, id: &str, version: u64) -> Document {
        Document {
            id: id.to_string(),
            version,
            content: self.content,
            language: self.language,
        }
    }
}

impl Document {
    /// Version listing entry for this row.
    ///
    /// # Arguments
    /// - `with_content`: Whether to keep content and language.
    pub fn to_version(&self, with_content: bool) -> DocumentVersion {
        DocumentVersion {
            version: self.version,
            content: with_content.then(|| self.content.clone()),
            language: with_content.then(|| self.language.clone()),
        }
    }
}

/// Request payload for creating a document.
#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub content: String,
    pub language: Option<String>,
}

/// Request payload for appending a new document version.
#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub content: String,
    pub language: Option<String>,
}

/// Query parameters for version listings.
#[derive(Debug, Default, Deserialize)]
pub struct VersionsQuery {
    #[serde(default)]
    pub with_content: bool,
}

/// Normalize a language label, defaulting to `plaintext`.
///
/// # Returns
/// Lowercased trimmed label, or `plaintext` when empty or absent.
pub fn normalize_language(language: Option<&str>) -> String {
    language
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_else(|| "plaintext".to_string())
}
