// ABOUTME: Sync cursor and filter id persistence keyed by account, in memory or SQLite
// ABOUTME: StorageBackend selects the backend explicitly instead of via marker types

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// File name of the sync-state database inside a `Sqlite` storage directory.
pub const SYNC_DB_FILE: &str = "athenais.sqlite3";

pub trait SyncStore: Send + Sync {
    fn save_filter_id(&self, user_id: &str, filter_id: &str) -> Result<()>;
    fn load_filter_id(&self, user_id: &str) -> Result<Option<String>>;
    fn save_next_batch(&self, user_id: &str, next_batch: &str) -> Result<()>;
    fn load_next_batch(&self, user_id: &str) -> Result<Option<String>>;
}

/// Where the transport keeps its state.
#[derive(Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Nothing survives a restart.
    Memory,
    /// SQLite databases under `path`; `passphrase` encrypts the transport's
    /// own state and crypto store.
    Sqlite {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl StorageBackend {
    /// Build the sync store matching this backend.
    pub fn sync_store(&self) -> Result<Arc<dyn SyncStore>> {
        match self {
            Self::Memory => Ok(Arc::new(MemorySyncStore::new())),
            Self::Sqlite { path, .. } => {
                std::fs::create_dir_all(path).with_context(|| {
                    format!("Failed to create storage directory {}", path.display())
                })?;
                Ok(Arc::new(SqliteSyncStore::open(path.join(SYNC_DB_FILE))?))
            }
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Sqlite { .. })
    }
}

// Custom Debug impl to redact the passphrase
impl fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::Sqlite { path, passphrase } => f
                .debug_struct("Sqlite")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "[REDACTED]"))
                .finish(),
        }
    }
}

#[derive(Default)]
struct MemoryState {
    filter_ids: HashMap<String, String>,
    next_batches: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemorySyncStore {
    state: Mutex<MemoryState>,
}

impl MemorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| anyhow::anyhow!("Sync store mutex poisoned: {}", e))?;
        Ok(f(&mut state))
    }
}

impl SyncStore for MemorySyncStore {
    fn save_filter_id(&self, user_id: &str, filter_id: &str) -> Result<()> {
        self.with_state(|s| {
            s.filter_ids
                .insert(user_id.to_string(), filter_id.to_string());
        })
    }

    fn load_filter_id(&self, user_id: &str) -> Result<Option<String>> {
        self.with_state(|s| s.filter_ids.get(user_id).cloned())
    }

    fn save_next_batch(&self, user_id: &str, next_batch: &str) -> Result<()> {
        self.with_state(|s| {
            s.next_batches
                .insert(user_id.to_string(), next_batch.to_string());
        })
    }

    fn load_next_batch(&self, user_id: &str) -> Result<Option<String>> {
        self.with_state(|s| s.next_batches.get(user_id).cloned())
    }
}

/// Two key-value tables: `filter_ids` and `next_batch`, both keyed by user id.
#[derive(Clone)]
pub struct SqliteSyncStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteSyncStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database {}", path.display()))?;
        let store = Self::from_connection(conn)?;
        tracing::info!(db = %path.display(), "Sync store initialized");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS filter_ids (
                user_id TEXT NOT NULL PRIMARY KEY,
                filter_id TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS next_batch (
                user_id TEXT NOT NULL PRIMARY KEY,
                next_batch TEXT NOT NULL
            );",
        )
        .context("Failed to create sync store tables")?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))
    }

    fn load(&self, sql: &str, user_id: &str) -> Result<Option<String>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(sql)?;
        match stmt.query_row(params![user_id], |row| row.get::<_, String>(0)) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl SyncStore for SqliteSyncStore {
    fn save_filter_id(&self, user_id: &str, filter_id: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO filter_ids (user_id, filter_id) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET filter_id = ?2",
            params![user_id, filter_id],
        )?;
        Ok(())
    }

    fn load_filter_id(&self, user_id: &str) -> Result<Option<String>> {
        self.load("SELECT filter_id FROM filter_ids WHERE user_id = ?1", user_id)
    }

    fn save_next_batch(&self, user_id: &str, next_batch: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO next_batch (user_id, next_batch) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET next_batch = ?2",
            params![user_id, next_batch],
        )?;
        Ok(())
    }

    fn load_next_batch(&self, user_id: &str) -> Result<Option<String>> {
        self.load("SELECT next_batch FROM next_batch WHERE user_id = ?1", user_id)
    }
}
