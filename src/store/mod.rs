//! Persistent key-value store.
//!
//! The engine persists JSON-serializable blobs under well-known keys. The
//! SQLite-backed implementation keeps the connection on a dedicated worker
//! thread; callers hand it closures and block on a reply channel. At human
//! event rates a store call is microseconds of queueing, so the synchronous
//! trait keeps every seam object-safe.

use std::{
    path::PathBuf,
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

pub mod analytics;
mod migrations;

use crate::error::EngineError;
use migrations::run_migrations;

pub use analytics::{AnalyticsArchive, AnalyticsData};

/// Well-known store keys and their shapes (see the external interface
/// contract): `usageAnalyticsData` holds events + learning data, the three
/// preference keys hold small blobs cleared on rollback, and
/// `finalAdaptationResults` is written once at shutdown.
pub mod keys {
    pub const USAGE_ANALYTICS: &str = "usageAnalyticsData";
    pub const CONTEXTUAL_PREFERENCES: &str = "contextualPreferences";
    pub const ENERGY_ADAPTATIONS: &str = "energyAdaptations";
    pub const BEHAVIORAL_ADAPTATIONS: &str = "behavioralAdaptations";
    pub const FINAL_ADAPTATION_RESULTS: &str = "finalAdaptationResults";
}

pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Value>, EngineError>;
    fn save(&self, key: &str, value: &Value) -> Result<(), EngineError>;
    fn remove(&self, key: &str) -> Result<(), EngineError>;

    /// Load with a fallback default; store failures degrade to the default
    /// rather than propagating.
    fn load_or(&self, key: &str, default: Value) -> Value {
        match self.load(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(err) => {
                error!("store load failed for '{key}', using default: {err}");
                default
            }
        }
    }
}

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct SqliteStoreInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for SqliteStoreInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("failed to send shutdown to store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("failed to join store thread: {join_err:?}");
            }
        }
    }
}

/// SQLite-backed store with a single worker thread owning the connection.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<SqliteStoreInner>,
}

impl SqliteStore {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create store directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("cadence-store".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite store")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run store migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        StoreCommand::Shutdown => break,
                    }
                }

                info!("store thread shutting down");
            })
            .with_context(|| "failed to spawn store worker thread")?;

        ready_rx
            .recv()
            .context("store worker exited before signaling readiness")??;

        info!("store initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(SqliteStoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel();

        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("store caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to store thread: {err}"))?;

        reply_rx
            .recv()
            .map_err(|_| anyhow!("store thread terminated unexpectedly"))?
    }
}

impl KeyValueStore for SqliteStore {
    fn load(&self, key: &str) -> Result<Option<Value>, EngineError> {
        let key = key.to_string();
        let raw = self
            .execute(move |conn| {
                conn.query_row(
                    "SELECT value FROM kv_entries WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .with_context(|| "failed to load kv entry")
            })
            .map_err(|err| EngineError::Store(err.to_string()))?;

        match raw {
            Some(text) => {
                let value = serde_json::from_str(&text)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), EngineError> {
        let key = key.to_string();
        let serialized = serde_json::to_string(value)?;
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO kv_entries (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, serialized, Utc::now().to_rfc3339()],
            )
            .with_context(|| "failed to save kv entry")?;
            Ok(())
        })
        .map_err(|err| EngineError::Store(err.to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), EngineError> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
                .with_context(|| "failed to remove kv entry")?;
            Ok(())
        })
        .map_err(|err| EngineError::Store(err.to_string()))
    }
}

/// In-memory store used by tests and as a fallback when no persistence is
/// wired up.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<std::collections::HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Value>, EngineError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| EngineError::Store("memory store poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), EngineError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| EngineError::Store("memory store poisoned".into()))?;
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), EngineError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| EngineError::Store("memory store poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}
