//! Shared constants used across snipbin crates.

use std::time::Duration;

/// Default API port for snipbin.
pub const DEFAULT_PORT: u16 = 38412;

/// Length of generated document and webhook ids.
pub const ID_LENGTH: usize = 8;

/// Alphabet used for generated ids.
pub const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Attempts made to find an unused id before giving up.
pub const MAX_ID_ATTEMPTS: usize = 10;

/// Interval used by the cleanup scheduler when the configured one is zero.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Deadline for a single expiry pass.
pub const CLEANUP_RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-delivery webhook timeout.
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default base URL for CLI/API clients.
pub const DEFAULT_CLI_SERVER_URL: &str = "http://localhost:38412";

/// File name for the redb database when `DB_PATH` is not set.
pub const DEFAULT_DB_FILE_NAME: &str = "snipbin.redb";
