//! `FileBackend` - JSON File Persistence
//!
//! Persists the whole collection as a single JSON array in one file,
//! with a rename-swap write protocol:
//!
//! ```text
//!       poll                rename              write             rename
//! [canonical visible] -> [hidden file] -> [hidden rewritten] -> [canonical]
//! ```
//!
//! The canonical file is renamed to a hidden (`__`-prefixed) sibling for
//! the duration of a write, so a concurrently starting writer polling for
//! the canonical name blocks until the swap completes. The restoring
//! rename runs whether or not the write succeeded. A write-lock mutex
//! additionally serializes writers sharing one backend instance, so the
//! polling only arbitrates between separate instances on one path.
//!
//! Crash policy: finding only the hidden file at startup means a write
//! died mid-swap and the array's consistency is unknown. The backend
//! starts fresh with an empty canonical file and leaves the hidden file
//! in place for inspection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, instrument, warn};

use super::backend::{field_contains, validate_term, FieldMap, StorageBackend};
use super::error::{StoreError, StoreResult};
use super::record::StoredRecord;
use crate::constants::{
    FILE_HIDDEN_PREFIX, FILE_POLL_ATTEMPTS_COUNT_MAX, FILE_POLL_INTERVAL_MS_DEFAULT,
};
use crate::uuid2::Uuid2;

/// Hook invoked with the full (sorted) collection before every save and
/// after every load, for repositories that maintain derived lookup tables.
pub type LookupRefreshFn<R> = Arc<dyn Fn(&[R]) + Send + Sync>;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a [`FileBackend`].
#[derive(Debug, Clone)]
pub struct FileBackendConfig {
    /// Path of the canonical database file.
    pub path: PathBuf,
    /// Interval between polls for the canonical file.
    pub poll_interval_ms: u64,
    /// Polling attempts before giving up with `Unavailable`.
    pub poll_attempts_max: u32,
    /// Pretty-print the persisted JSON array.
    pub pretty_json: bool,
}

impl FileBackendConfig {
    /// Configuration with default polling budget and compact JSON.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval_ms: FILE_POLL_INTERVAL_MS_DEFAULT,
            poll_attempts_max: FILE_POLL_ATTEMPTS_COUNT_MAX,
            pretty_json: false,
        }
    }

    /// Override the polling budget.
    #[must_use]
    pub fn with_polling(mut self, interval_ms: u64, attempts_max: u32) -> Self {
        assert!(attempts_max > 0, "polling budget must allow at least one attempt");
        self.poll_interval_ms = interval_ms;
        self.poll_attempts_max = attempts_max;
        self
    }

    /// Persist pretty-printed JSON instead of compact.
    #[must_use]
    pub fn with_pretty_json(mut self) -> Self {
        self.pretty_json = true;
        self
    }
}

// =============================================================================
// FileBackend
// =============================================================================

/// File-persisted storage backend.
///
/// Serves reads from an in-memory map; every mutation rewrites the whole
/// file through the rename-swap protocol. Cheap to clone (clones share
/// the map and the write lock).
#[derive(Clone)]
pub struct FileBackend<R: StoredRecord> {
    config: FileBackendConfig,
    canonical_path: PathBuf,
    hidden_path: PathBuf,
    records: Arc<RwLock<HashMap<Uuid2, R>>>,
    write_lock: Arc<tokio::sync::Mutex<()>>,
    fields: Arc<FieldMap<R>>,
    lookup_refresh: Option<LookupRefreshFn<R>>,
}

impl<R: StoredRecord> std::fmt::Debug for FileBackend<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("path", &self.canonical_path)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl<R: StoredRecord> FileBackend<R> {
    /// Open a file backend at the configured path.
    ///
    /// Creates parent directories and an empty canonical file when absent.
    /// If only the hidden in-flight file exists, a previous writer died
    /// mid-swap: an empty canonical file is created and the hidden file is
    /// left in place for inspection.
    ///
    /// Does NOT read the file; call [`load`](Self::load) (or
    /// [`spawn_load`](Self::spawn_load)) afterwards.
    pub fn new(config: FileBackendConfig, fields: FieldMap<R>) -> StoreResult<Self> {
        let canonical_path = config.path.clone();
        let hidden_path = hidden_sibling(&canonical_path)?;

        if let Some(parent) = canonical_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::io(format!("create {}: {e}", parent.display())))?;
            }
        }

        if !canonical_path.exists() {
            if hidden_path.exists() {
                warn!(
                    hidden = %hidden_path.display(),
                    "found orphaned in-flight file; starting fresh and leaving it for inspection"
                );
            }
            std::fs::write(&canonical_path, "")
                .map_err(|e| StoreError::io(format!("create {}: {e}", canonical_path.display())))?;
        }

        Ok(Self {
            config,
            canonical_path,
            hidden_path,
            records: Arc::new(RwLock::new(HashMap::new())),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
            fields: Arc::new(fields),
            lookup_refresh: None,
        })
    }

    /// Install a lookup-table refresh hook.
    #[must_use]
    pub fn with_lookup_refresh(mut self, hook: LookupRefreshFn<R>) -> Self {
        self.lookup_refresh = Some(hook);
        self
    }

    /// Path of the canonical database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.canonical_path
    }

    /// Number of loaded records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// A copy of the whole loaded collection keyed by id.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<Uuid2, R> {
        self.records.read().unwrap().clone()
    }

    /// Read the canonical file into memory, replacing the loaded collection.
    ///
    /// An empty file loads as an empty collection. Returns the number of
    /// records loaded.
    #[instrument(skip(self), fields(path = %self.canonical_path.display()))]
    pub async fn load(&self) -> StoreResult<usize> {
        self.poll_for_canonical().await?;

        let text = tokio::fs::read_to_string(&self.canonical_path)
            .await
            .map_err(|e| StoreError::io(format!("read {}: {e}", self.canonical_path.display())))?;

        let loaded: Vec<R> = if text.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&text).map_err(|e| {
                StoreError::malformed(format!("parse {}: {e}", self.canonical_path.display()))
            })?
        };

        let count = loaded.len();
        {
            let mut records = self.records.write().unwrap();
            records.clear();
            for record in loaded {
                records.insert(record.id(), record);
            }
        }
        self.refresh_lookup();

        debug!(count, "loaded records from file");
        Ok(count)
    }

    /// Load in a background task, logging on failure.
    pub fn spawn_load(&self) -> JoinHandle<()> {
        let backend = self.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.load().await {
                error!(error = %e, "background load failed");
            }
        })
    }

    fn refresh_lookup(&self) {
        if let Some(hook) = &self.lookup_refresh {
            hook(&self.sorted_records());
        }
    }

    fn sorted_records(&self) -> Vec<R> {
        let records = self.records.read().unwrap();
        let mut all: Vec<R> = records.values().cloned().collect();
        all.sort_by_key(|r| r.id().uuid());
        all
    }

    /// Wait until the canonical file is visible, or fail with `Unavailable`
    /// once the polling budget is spent.
    async fn poll_for_canonical(&self) -> StoreResult<()> {
        for attempt in 1..=self.config.poll_attempts_max {
            if self.canonical_path.exists() {
                return Ok(());
            }
            // No sleep after the last attempt.
            if attempt < self.config.poll_attempts_max {
                debug!(attempt, "canonical file not visible; polling");
                sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
            }
        }

        Err(StoreError::unavailable(
            self.canonical_path.display().to_string(),
            self.config.poll_attempts_max,
        ))
    }

    /// Persist the in-memory collection through the rename-swap protocol.
    #[instrument(skip(self), fields(path = %self.canonical_path.display()))]
    async fn save_to_disk(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.refresh_lookup();

        self.poll_for_canonical().await?;

        tokio::fs::rename(&self.canonical_path, &self.hidden_path)
            .await
            .map_err(|e| StoreError::io(format!("hide {}: {e}", self.canonical_path.display())))?;

        let write_result = self.write_hidden().await;

        // The restoring rename runs whether or not the write succeeded.
        let restore_result = tokio::fs::rename(&self.hidden_path, &self.canonical_path)
            .await
            .map_err(|e| {
                StoreError::io(format!("restore {}: {e}", self.canonical_path.display()))
            });

        if let Err(write_err) = write_result {
            // A failed restore here leaves the canonical name missing;
            // the write error still takes precedence, so log the restore.
            if let Err(restore_err) = &restore_result {
                error!(error = %restore_err, "restore rename failed after failed write");
            }
            return Err(write_err);
        }
        restore_result
    }

    async fn write_hidden(&self) -> StoreResult<()> {
        let all = self.sorted_records();
        let json = if self.config.pretty_json {
            serde_json::to_string_pretty(&all)
        } else {
            serde_json::to_string(&all)
        }
        .map_err(|e| StoreError::io(format!("serialize collection: {e}")))?;

        tokio::fs::write(&self.hidden_path, json)
            .await
            .map_err(|e| StoreError::io(format!("write {}: {e}", self.hidden_path.display())))
    }
}

fn hidden_sibling(canonical: &Path) -> StoreResult<PathBuf> {
    let Some(file_name) = canonical.file_name().and_then(|n| n.to_str()) else {
        return Err(StoreError::malformed(format!(
            "database path has no file name: {}",
            canonical.display()
        )));
    };
    let hidden_name = format!("{FILE_HIDDEN_PREFIX}{file_name}");
    Ok(canonical.with_file_name(hidden_name))
}

// =============================================================================
// StorageBackend
// =============================================================================

#[async_trait]
impl<R: StoredRecord> StorageBackend<R> for FileBackend<R> {
    async fn find_all(&self) -> StoreResult<Vec<R>> {
        Ok(self.sorted_records())
    }

    async fn find_by_id(&self, id: &Uuid2) -> StoreResult<R> {
        let records = self.records.read().unwrap();
        records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn find_by_field(&self, field: &str, term: &str) -> StoreResult<Vec<R>> {
        validate_term(term)?;
        let accessor = self
            .fields
            .accessor(field)
            .ok_or_else(|| StoreError::malformed(format!("unknown field: {field}")))?;

        let mut hits: Vec<R> = {
            let records = self.records.read().unwrap();
            records
                .values()
                .filter(|r| field_contains(&accessor(r), term))
                .cloned()
                .collect()
        };
        hits.sort_by_key(|r| r.id().uuid());

        Ok(hits)
    }

    async fn add(&self, record: R) -> StoreResult<R> {
        let id = record.id();
        {
            let mut records = self.records.write().unwrap();
            if records.contains_key(&id) {
                return Err(StoreError::already_exists(&id));
            }
            records.insert(id, record.clone());
        }
        self.save_to_disk().await?;

        Ok(record)
    }

    async fn update(&self, record: R) -> StoreResult<R> {
        let id = record.id();
        {
            let mut records = self.records.write().unwrap();
            if !records.contains_key(&id) {
                return Err(StoreError::not_found(&id));
            }
            records.insert(id, record.clone());
        }
        self.save_to_disk().await?;

        Ok(record)
    }

    async fn upsert(&self, record: R) -> StoreResult<R> {
        {
            let mut records = self.records.write().unwrap();
            records.insert(record.id(), record.clone());
        }
        self.save_to_disk().await?;

        Ok(record)
    }

    async fn delete(&self, record: &R) -> StoreResult<bool> {
        self.delete_by_id(&record.id()).await
    }

    async fn delete_by_id(&self, id: &Uuid2) -> StoreResult<bool> {
        let existed = {
            let mut records = self.records.write().unwrap();
            records.remove(id).is_some()
        };
        if existed {
            self.save_to_disk().await?;
        }

        Ok(existed)
    }

    /// Clears the collection, removes both files and recreates an empty
    /// canonical file so later saves find something to poll for.
    async fn delete_all(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;

        self.records.write().unwrap().clear();
        self.refresh_lookup();

        for path in [&self.canonical_path, &self.hidden_path] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StoreError::io(format!("remove {}: {e}", path.display())));
                }
            }
        }

        tokio::fs::write(&self.canonical_path, "")
            .await
            .map_err(|e| StoreError::io(format!("create {}: {e}", self.canonical_path.display())))
    }
}

// =============================================================================
// Tests
// =============================================================================
