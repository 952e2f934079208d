//! LMDB-backed store implementation.
//!
//! Uses the heed crate (Rust bindings for LMDB) as the persistent
//! key-value engine. Each schema gets its own environment under the
//! backend root, named after the schema; each declared store becomes a
//! named database within that environment, plus a meta database holding
//! the schema version.
//!
//! # Upgrades
//!
//! The first time a schema's environment is opened, the recorded version
//! is compared with the schema version and, if it is behind, every
//! declared store table is created (creation is idempotent, existing
//! tables are never dropped) and the new version recorded. All of this
//! happens in one write transaction.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The backend uses read transactions
//! for `get` and write transactions for `put` and `clear`; concurrent
//! puts to the same key serialize on LMDB's write lock, last write wins.
//! Statistics are tracked behind an `RwLock`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};

use stash_core::{CacheError, CacheResult, CacheSchema, StorageError};

use crate::migration::plan_upgrade;
use crate::traits::{CacheStats, StoreBackend};

/// Name of the per-environment database holding upgrade metadata.
const META_DB: &str = "__stash_meta";

/// Meta key under which the schema version is recorded.
const VERSION_KEY: &str = "schema_version";

/// Named-database capacity of every environment, including the meta
/// database. heed keeps environments registered process-wide and
/// rejects reopening a path with different options, so this must not
/// vary with the schema: a version bump that adds a store, or a second
/// backend over the same root, reopens with the same capacity and gets
/// the already-open environment back.
const MAX_DBS: u32 = 128;

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbBackendError {
    /// Failed to open or create an LMDB environment.
    #[error("failed to open LMDB environment \"{name}\": {reason}")]
    EnvOpen { name: String, reason: String },

    /// Failed to open or create a database within an environment.
    #[error("failed to open database \"{name}\": {reason}")]
    DbOpen { name: String, reason: String },

    /// Transaction error.
    #[error("transaction error: {reason}")]
    Transaction { reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A statistics or environment lock was poisoned.
    #[error("backend lock poisoned")]
    Poisoned,
}

impl From<LmdbBackendError> for CacheError {
    fn from(e: LmdbBackendError) -> Self {
        match e {
            LmdbBackendError::EnvOpen { name, reason }
            | LmdbBackendError::DbOpen { name, reason } => {
                CacheError::Storage(StorageError::OpenFailed { name, reason })
            }
            LmdbBackendError::Poisoned => CacheError::Storage(StorageError::LockPoisoned),
            other => CacheError::Storage(StorageError::TransactionFailed {
                reason: other.to_string(),
            }),
        }
    }
}

/// Per-store statistics tracking.
#[derive(Debug, Default)]
struct StoreStatsInner {
    hits: u64,
    misses: u64,
    entries: u64,
}

/// LMDB-backed persistent store backend.
///
/// Environments are opened lazily on the first operation touching a
/// schema, then memoized for the life of the backend.
pub struct LmdbStoreBackend {
    /// Directory under which per-schema environments live.
    root: PathBuf,
    /// Maximum size of each environment in megabytes.
    max_size_mb: usize,
    /// Memoized environments, keyed by schema name.
    envs: RwLock<HashMap<String, Env>>,
    /// Per-store statistics, keyed by `schema/store`.
    stats: RwLock<HashMap<String, StoreStatsInner>>,
}

impl LmdbStoreBackend {
    /// Create a new LMDB store backend.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory where per-schema LMDB environments are stored
    /// * `max_size_mb` - Maximum size of each environment in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created.
    pub fn new<P: AsRef<Path>>(root: P, max_size_mb: usize) -> Result<Self, LmdbBackendError> {
        std::fs::create_dir_all(&root)?;

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            max_size_mb,
            envs: RwLock::new(HashMap::new()),
            stats: RwLock::new(HashMap::new()),
        })
    }

    /// Get statistics for one store table.
    pub fn store_stats(&self, schema: &CacheSchema, store: &str) -> CacheStats {
        let key = stats_key(schema, store);
        if let Ok(stats) = self.stats.read() {
            if let Some(inner) = stats.get(&key) {
                return CacheStats {
                    hits: inner.hits,
                    misses: inner.misses,
                    entry_count: inner.entries,
                };
            }
        }
        CacheStats::default()
    }

    /// Open (memoizing) the environment for a schema, upgrading it if the
    /// recorded version is behind the schema version.
    fn open_env(&self, schema: &CacheSchema) -> Result<Env, LmdbBackendError> {
        {
            let envs = self.envs.read().map_err(|_| LmdbBackendError::Poisoned)?;
            if let Some(env) = envs.get(&schema.name) {
                return Ok(env.clone());
            }
        }

        let mut envs = self.envs.write().map_err(|_| LmdbBackendError::Poisoned)?;
        // Lost the race: someone else opened it while we waited.
        if let Some(env) = envs.get(&schema.name) {
            return Ok(env.clone());
        }

        let path = self.root.join(&schema.name);
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(self.max_size_mb * 1024 * 1024)
                .max_dbs(MAX_DBS)
                .open(&path)
        }
        .map_err(|e| LmdbBackendError::EnvOpen {
            name: schema.name.clone(),
            reason: e.to_string(),
        })?;

        migrate(&env, schema)?;

        envs.insert(schema.name.clone(), env.clone());
        Ok(env)
    }

    /// Open a store's database for reading. Returns None if the table has
    /// never been created in this environment.
    fn open_store_db(
        &self,
        env: &Env,
        rtxn: &heed::RoTxn<'_>,
        store: &str,
    ) -> Result<Option<Database<Str, Bytes>>, LmdbBackendError> {
        env.open_database(rtxn, Some(store))
            .map_err(|e| LmdbBackendError::DbOpen {
                name: store.to_string(),
                reason: e.to_string(),
            })
    }

    /// Record a cache hit for a store.
    fn record_hit(&self, key: &str) {
        if let Ok(mut stats) = self.stats.write() {
            stats.entry(key.to_string()).or_default().hits += 1;
        }
    }

    /// Record a cache miss for a store.
    fn record_miss(&self, key: &str) {
        if let Ok(mut stats) = self.stats.write() {
            stats.entry(key.to_string()).or_default().misses += 1;
        }
    }

    /// Update entry statistics after a successful put.
    fn record_put(&self, key: &str, is_new: bool) {
        if is_new {
            if let Ok(mut stats) = self.stats.write() {
                stats.entry(key.to_string()).or_default().entries += 1;
            }
        }
    }

    /// Reset the entry count after a clear.
    fn record_clear(&self, key: &str) {
        if let Ok(mut stats) = self.stats.write() {
            if let Some(inner) = stats.get_mut(key) {
                inner.entries = 0;
            }
        }
    }
}

/// Upgrade an environment to the schema's version if needed.
///
/// Creates every declared store table (idempotent: existing tables are
/// opened, not replaced) and records the new version in the meta
/// database, all in one committed write transaction.
fn migrate(env: &Env, schema: &CacheSchema) -> Result<(), LmdbBackendError> {
    let mut wtxn = env.write_txn().map_err(|e| LmdbBackendError::Transaction {
        reason: e.to_string(),
    })?;

    let meta: Database<Str, Bytes> = env
        .create_database(&mut wtxn, Some(META_DB))
        .map_err(|e| LmdbBackendError::DbOpen {
            name: META_DB.to_string(),
            reason: e.to_string(),
        })?;

    let current = meta
        .get(&wtxn, VERSION_KEY)
        .map_err(|e| LmdbBackendError::Transaction {
            reason: e.to_string(),
        })?
        .and_then(|bytes| bytes.try_into().ok().map(u32::from_le_bytes));

    if let Some(plan) = plan_upgrade(current, schema) {
        for store in &plan.create_stores {
            let _db: Database<Str, Bytes> = env
                .create_database(&mut wtxn, Some(store))
                .map_err(|e| LmdbBackendError::DbOpen {
                    name: store.clone(),
                    reason: e.to_string(),
                })?;
        }

        meta.put(&mut wtxn, VERSION_KEY, &plan.to.to_le_bytes())
            .map_err(|e| LmdbBackendError::Transaction {
                reason: e.to_string(),
            })?;

        tracing::debug!(
            schema = %schema.name,
            from = ?plan.from,
            to = plan.to,
            stores = plan.create_stores.len(),
            "upgraded cache database"
        );
    }

    wtxn.commit().map_err(|e| LmdbBackendError::Transaction {
        reason: e.to_string(),
    })
}

fn stats_key(schema: &CacheSchema, store: &str) -> String {
    format!("{}/{}", schema.name, store)
}

fn txn_err(e: heed::Error) -> LmdbBackendError {
    LmdbBackendError::Transaction {
        reason: e.to_string(),
    }
}

#[async_trait]
impl StoreBackend for LmdbStoreBackend {
    fn is_available(&self) -> bool {
        true
    }

    async fn get_raw(
        &self,
        schema: &CacheSchema,
        store: &str,
        key: &str,
    ) -> CacheResult<Option<Vec<u8>>> {
        let stats_key = stats_key(schema, store);
        let env = self.open_env(schema)?;

        let rtxn = env.read_txn().map_err(txn_err)?;

        let Some(db) = self.open_store_db(&env, &rtxn, store)? else {
            self.record_miss(&stats_key);
            return Ok(None);
        };

        match db.get(&rtxn, key).map_err(txn_err)? {
            Some(bytes) => {
                self.record_hit(&stats_key);
                Ok(Some(bytes.to_vec()))
            }
            None => {
                self.record_miss(&stats_key);
                Ok(None)
            }
        }
    }

    async fn put_raw(
        &self,
        schema: &CacheSchema,
        store: &str,
        key: &str,
        value: Vec<u8>,
    ) -> CacheResult<()> {
        let stats_key = stats_key(schema, store);
        let env = self.open_env(schema)?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;

        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, Some(store))
            .map_err(|e| LmdbBackendError::DbOpen {
                name: store.to_string(),
                reason: e.to_string(),
            })?;

        let is_new = db.get(&wtxn, key).map_err(txn_err)?.is_none();

        db.put(&mut wtxn, key, &value).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;

        self.record_put(&stats_key, is_new);
        Ok(())
    }

    async fn clear_store(&self, schema: &CacheSchema, store: &str) -> CacheResult<()> {
        let stats_key = stats_key(schema, store);
        let env = self.open_env(schema)?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;

        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, Some(store))
            .map_err(|e| LmdbBackendError::DbOpen {
                name: store.to_string(),
                reason: e.to_string(),
            })?;

        db.clear(&mut wtxn).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;

        self.record_clear(&stats_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn contacts_schema() -> CacheSchema {
        CacheSchema::new("contacts", 1).with_store("people")
    }

    fn create_test_backend() -> (LmdbStoreBackend, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let backend =
            LmdbStoreBackend::new(temp_dir.path(), 10).expect("backend creation should succeed");
        (backend, temp_dir)
    }

    #[tokio::test]
    async fn test_put_and_get_raw() {
        let (backend, _temp_dir) = create_test_backend();
        let schema = contacts_schema();

        backend
            .put_raw(&schema, "people", "u1", b"alice".to_vec())
            .await
            .expect("put_raw should succeed");

        let value = backend
            .get_raw(&schema, "people", "u1")
            .await
            .expect("get_raw should succeed");
        assert_eq!(value.as_deref(), Some(b"alice".as_ref()));
    }

    #[tokio::test]
    async fn test_get_missing_key_returns_none() {
        let (backend, _temp_dir) = create_test_backend();
        let schema = contacts_schema();

        let value = backend
            .get_raw(&schema, "people", "never-written")
            .await
            .expect("get_raw should succeed");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_is_last_write_wins() {
        let (backend, _temp_dir) = create_test_backend();
        let schema = contacts_schema();

        backend
            .put_raw(&schema, "people", "u1", b"first".to_vec())
            .await
            .expect("put_raw should succeed");
        backend
            .put_raw(&schema, "people", "u1", b"second".to_vec())
            .await
            .expect("put_raw should succeed");

        let value = backend
            .get_raw(&schema, "people", "u1")
            .await
            .expect("get_raw should succeed");
        assert_eq!(value.as_deref(), Some(b"second".as_ref()));
    }

    #[tokio::test]
    async fn test_clear_store_removes_all_entries() {
        let (backend, _temp_dir) = create_test_backend();
        let schema = contacts_schema();

        for key in ["u1", "u2", "u3"] {
            backend
                .put_raw(&schema, "people", key, key.as_bytes().to_vec())
                .await
                .expect("put_raw should succeed");
        }

        backend
            .clear_store(&schema, "people")
            .await
            .expect("clear_store should succeed");

        for key in ["u1", "u2", "u3"] {
            let value = backend
                .get_raw(&schema, "people", key)
                .await
                .expect("get_raw should succeed");
            assert!(value.is_none(), "{key} should be gone after clear");
        }
    }

    #[tokio::test]
    async fn test_store_isolation_within_schema() {
        let (backend, _temp_dir) = create_test_backend();
        let schema = CacheSchema::new("contacts", 1)
            .with_store("people")
            .with_store("photos");

        backend
            .put_raw(&schema, "people", "u1", b"alice".to_vec())
            .await
            .expect("put_raw should succeed");

        let other = backend
            .get_raw(&schema, "photos", "u1")
            .await
            .expect("get_raw should succeed");
        assert!(other.is_none(), "photos must not see people's entries");
    }

    #[tokio::test]
    async fn test_version_bump_adds_store_and_keeps_data() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");

        let v1 = CacheSchema::new("contacts", 1).with_store("people");
        {
            let backend = LmdbStoreBackend::new(temp_dir.path(), 10)
                .expect("backend creation should succeed");
            backend
                .put_raw(&v1, "people", "u1", b"alice".to_vec())
                .await
                .expect("put_raw should succeed");
        }

        // Reopen at version 2 with an extra store. The old table's data
        // must survive and the new table must be usable.
        let v2 = CacheSchema::new("contacts", 2)
            .with_store("people")
            .with_store("groups");
        let backend =
            LmdbStoreBackend::new(temp_dir.path(), 10).expect("backend creation should succeed");

        let survived = backend
            .get_raw(&v2, "people", "u1")
            .await
            .expect("get_raw should succeed");
        assert_eq!(survived.as_deref(), Some(b"alice".as_ref()));

        backend
            .put_raw(&v2, "groups", "g1", b"admins".to_vec())
            .await
            .expect("put_raw should succeed");
        let group = backend
            .get_raw(&v2, "groups", "g1")
            .await
            .expect("get_raw should succeed");
        assert_eq!(group.as_deref(), Some(b"admins".as_ref()));
    }

    #[tokio::test]
    async fn test_second_backend_over_same_root_shares_data() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let schema = contacts_schema();

        let first =
            LmdbStoreBackend::new(temp_dir.path(), 10).expect("backend creation should succeed");
        first
            .put_raw(&schema, "people", "u1", b"alice".to_vec())
            .await
            .expect("put_raw should succeed");

        // A second backend over the same root, while the first is still
        // alive, must open the same environment rather than fail.
        let second =
            LmdbStoreBackend::new(temp_dir.path(), 10).expect("backend creation should succeed");
        let value = second
            .get_raw(&schema, "people", "u1")
            .await
            .expect("get_raw should succeed");
        assert_eq!(value.as_deref(), Some(b"alice".as_ref()));
    }

    #[tokio::test]
    async fn test_stats() {
        let (backend, _temp_dir) = create_test_backend();
        let schema = contacts_schema();

        // Miss
        let _ = backend.get_raw(&schema, "people", "u1").await;

        backend
            .put_raw(&schema, "people", "u1", b"alice".to_vec())
            .await
            .expect("put_raw should succeed");

        // Hits
        let _ = backend.get_raw(&schema, "people", "u1").await;
        let _ = backend.get_raw(&schema, "people", "u1").await;

        let stats = backend.store_stats(&schema, "people");
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.entry_count, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 0.001);
    }
}
