//! HTTP request handlers.

pub(crate) mod auth;
/// Document and version endpoints.
pub mod document;
/// Webhook management endpoints.
pub mod webhook;
