//! Shared integration-test server bootstrap helpers.

use axum_test::TestServer;
use snipbin_server::db::{ManualClock, StoreOptions};
use snipbin_server::{create_app, AppState, Config, Database};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

pub(crate) const TEST_SECRET: &str = "snipbin-integration-secret";

pub(crate) fn test_config_for_db_path(db_path: &Path) -> Config {
    Config {
        port: 0,
        db_path: db_path.to_str().expect("db path").to_string(),
        max_document_size: 0,
        expire_after: Duration::ZERO,
        cleanup_interval: Duration::from_secs(60),
        jwt_secret: TEST_SECRET.to_string(),
        webhook_timeout: Duration::from_secs(5),
    }
}

pub(crate) fn test_server_for_config(config: Config) -> (TestServer, AppState) {
    let db = Database::new(config.db_path.as_str()).expect("open db");
    let state = AppState::new(config, db).expect("state");
    let app = create_app(state.clone(), false);
    let server = TestServer::new(app).expect("server");
    (server, state)
}

pub(crate) fn setup_test_server() -> (TestServer, TempDir, AppState) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("test.redb");
    let config = test_config_for_db_path(&db_path);
    let (server, state) = test_server_for_config(config);
    (server, temp_dir, state)
}

/// Test server whose version clock is driven by the returned [`ManualClock`].
pub(crate) fn setup_clocked_server(
    start_seconds: u64,
) -> (TestServer, TempDir, AppState, std::sync::Arc<ManualClock>) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("test.redb");
    let config = test_config_for_db_path(&db_path);
    let clock = std::sync::Arc::new(ManualClock::at(start_seconds));
    let db = Database::open(
        config.db_path.as_str(),
        StoreOptions {
            clock: clock.clone(),
            ..StoreOptions::default()
        },
    )
    .expect("open db");
    let state = AppState::new(config, db).expect("state");
    let server = TestServer::new(create_app(state.clone(), false)).expect("server");
    (server, temp_dir, state, clock)
}
