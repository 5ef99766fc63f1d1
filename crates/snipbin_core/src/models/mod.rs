/// Document rows and version listings.
pub mod document;
/// Share-token permission vocabulary.
pub mod permission;
/// Webhook subscriptions and event kinds.
pub mod webhook;
