//! Core domain library for snipbin (config, storage, tokens, webhooks).

/// Background expiry of old document versions.
pub mod cleanup;
/// Configuration loading and defaults.
pub mod config;
/// Shared defaults used across snipbin crates.
pub mod constants;
/// Database access layer and transactions.
pub mod db;
/// Outbound webhook delivery.
pub mod dispatch;
/// Application error types (storage/domain).
pub mod error;
/// Data models for persistence and API payloads.
pub mod models;
/// Random identifier generation.
pub mod naming;
/// Signed share-token issuance and validation.
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use cleanup::CleanupScheduler;
pub use config::Config;
pub use constants::*;
pub use db::Database;
pub use dispatch::WebhookDispatcher;
pub use error::AppError;
pub use token::PermissionTokenService;
