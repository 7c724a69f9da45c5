//! Progress persistence
//!
//! Run checkpoints are two string slots in a key-value store: the CSV body
//! (`csvData`) and the JSON-encoded progress log (`results`). Each checkpoint
//! overwrites both slots, so repeated calls never grow storage beyond the
//! latest snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::constants::storage::{CSV_DATA_KEY, RESULTS_KEY};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode progress log: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// String-valued durable key-value storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One file per key inside a directory.
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.slot_path(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.slot_path(key)?;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(io_error(&self.dir))?;

        let tmp_path = self.dir.join(format!(".{key}.tmp"));
        fs::write(&tmp_path, value)
            .await
            .map_err(io_error(&tmp_path))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(io_error(&path))?;

        debug!("Stored slot {} ({} bytes)", key, value.len());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.slot_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path)(e)),
        }
    }
}

/// In-memory store for tests and throwaway sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    slots: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.slots
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.slots.write().await.remove(key);
        Ok(())
    }
}

/// Snapshot of an interrupted or finished run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunProgress {
    pub csv_body: String,
    pub log: Vec<String>,
}

/// Checkpoint slots of the feedback run over any [`KeyValueStore`]
#[derive(Clone)]
pub struct ProgressPersistence {
    store: Arc<dyn KeyValueStore>,
}

impl ProgressPersistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::new()))
    }

    pub fn on_disk(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileKeyValueStore::new(dir)))
    }

    /// Overwrite both slots with the current snapshot.
    pub async fn checkpoint(&self, csv_body: &str, log: &[String]) -> Result<(), StorageError> {
        let encoded_log = serde_json::to_string(log)?;
        self.store.set(CSV_DATA_KEY, csv_body).await?;
        self.store.set(RESULTS_KEY, &encoded_log).await?;
        debug!(
            "💾 Checkpoint saved: {} CSV bytes, {} log lines",
            csv_body.len(),
            log.len()
        );
        Ok(())
    }

    /// The last snapshot, if any slot is present.
    ///
    /// An undecodable log slot is reported and treated as an empty log so
    /// the CSV body is still recoverable.
    pub async fn load_last_checkpoint(&self) -> Result<Option<RunProgress>, StorageError> {
        let csv_body = self.store.get(CSV_DATA_KEY).await?;
        let encoded_log = self.store.get(RESULTS_KEY).await?;

        if csv_body.is_none() && encoded_log.is_none() {
            return Ok(None);
        }

        let log = match encoded_log {
            Some(encoded) => serde_json::from_str::<Vec<String>>(&encoded).unwrap_or_else(|e| {
                warn!("⚠️ Stored progress log is unreadable, ignoring it: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        info!("📂 Restored checkpoint with {} log lines", log.len());
        Ok(Some(RunProgress {
            csv_body: csv_body.unwrap_or_default(),
            log,
        }))
    }

    /// Remove both slots.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(CSV_DATA_KEY).await?;
        self.store.remove(RESULTS_KEY).await?;
        debug!("🧹 Checkpoint cleared");
        Ok(())
    }
}
