//! Shared test-only helpers for snipbin_core.

use crate::db::time_util::ManualClock;
use crate::db::{Database, StoreOptions};
use crate::naming::{generate_id, IdSource};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Id source that replays a script, then falls back to random ids.
pub(crate) struct ScriptedIds {
    script: Mutex<VecDeque<String>>,
}

impl ScriptedIds {
    pub(crate) fn new<S: Into<String>>(script: Vec<S>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(Into::into).collect()),
        }
    }

    pub(crate) fn push(&self, id: &str) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(id.to_string());
    }
}

impl IdSource for ScriptedIds {
    fn next_id(&self) -> String {
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(generate_id)
    }
}

/// Creates an isolated temporary database and returns it with the temp dir.
///
/// Keep the [`TempDir`] alive for the full test to preserve the backing file.
pub(crate) fn setup_temp_db() -> (Database, TempDir) {
    setup_temp_db_with(StoreOptions::default())
}

/// Like [`setup_temp_db`], with explicit store options.
pub(crate) fn setup_temp_db_with(options: StoreOptions) -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("test.redb");
    let db = Database::open(db_path.to_str().expect("db path"), options).expect("db");
    (db, temp_dir)
}

/// Database whose clock and id source are controlled by the test.
pub(crate) struct ControlledDb {
    pub db: Database,
    pub clock: Arc<ManualClock>,
    pub ids: Arc<ScriptedIds>,
    _dir: TempDir,
}

pub(crate) fn setup_controlled_db(start_seconds: u64) -> ControlledDb {
    let clock = Arc::new(ManualClock::at(start_seconds));
    let ids = Arc::new(ScriptedIds::new(Vec::<String>::new()));
    let options = StoreOptions {
        clock: clock.clone(),
        ids: ids.clone(),
        ..StoreOptions::default()
    };
    let (db, dir) = setup_temp_db_with(options);
    ControlledDb {
        db,
        clock,
        ids,
        _dir: dir,
    }
}
