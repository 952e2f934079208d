//! Cache item and backend traits.
//!
//! This module defines the traits that must be implemented by cached
//! record types and by pluggable storage backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use stash_core::{CacheResult, CacheSchema};

/// Trait for record types that can be cached.
///
/// Every cached record carries an optional retrieval timestamp. The
/// store overwrites it on every successful write, so callers cannot
/// forge cache-insertion time; a record read back from the cache always
/// has the stamp set.
///
/// # Implementation Requirements
///
/// - `time_cached()`/`set_time_cached()` must access the same field
/// - Implementations must be `Clone`, `Serialize`, and `DeserializeOwned`
///   for cache storage
/// - Implementations must be `Send + Sync + 'static` for async
///   compatibility
pub trait CacheItem: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// When this record was written to the cache, if it ever was.
    fn time_cached(&self) -> Option<DateTime<Utc>>;

    /// Overwrite the retrieval timestamp.
    fn set_time_cached(&mut self, cached_at: DateTime<Utc>);

    /// Whether this record is older than the given maximum age.
    ///
    /// Expiry is advisory: the store never checks it. A record without a
    /// stamp counts as expired; a stamp in the future (clock skew) counts
    /// as age zero.
    fn is_expired(&self, max_age: Duration) -> bool {
        match self.time_cached() {
            Some(cached_at) => {
                let age = Utc::now()
                    .signed_duration_since(cached_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                age > max_age
            }
            None => true,
        }
    }
}

/// Persistent backend trait for pluggable store implementations.
///
/// This trait abstracts over the key-value engine beneath the typed
/// stores. Operations are keyed by `(schema, store, key)`; the backend
/// is responsible for creating declared store tables when the schema
/// version advances, and creation must be additive only.
///
/// # Capability
///
/// `is_available()` is the capability check: when it returns false the
/// typed store degrades every operation to a successful no-op instead of
/// raising errors.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Whether persistent storage is available in this environment.
    fn is_available(&self) -> bool;

    /// Get the raw bytes stored under `key`, or None if absent.
    async fn get_raw(
        &self,
        schema: &CacheSchema,
        store: &str,
        key: &str,
    ) -> CacheResult<Option<Vec<u8>>>;

    /// Write raw bytes under `key`, overwriting any prior value.
    async fn put_raw(
        &self,
        schema: &CacheSchema,
        store: &str,
        key: &str,
        value: Vec<u8>,
    ) -> CacheResult<()>;

    /// Remove every entry in the given store table.
    async fn clear_store(&self, schema: &CacheSchema, store: &str) -> CacheResult<()>;
}

/// Backend for environments without persistent storage.
///
/// Every operation resolves successfully as a no-op or `None`; this is
/// the degrade path behind the capability check, not an error path.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableBackend;

#[async_trait]
impl StoreBackend for UnavailableBackend {
    fn is_available(&self) -> bool {
        false
    }

    async fn get_raw(
        &self,
        _schema: &CacheSchema,
        _store: &str,
        _key: &str,
    ) -> CacheResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn put_raw(
        &self,
        _schema: &CacheSchema,
        _store: &str,
        _key: &str,
        _value: Vec<u8>,
    ) -> CacheResult<()> {
        Ok(())
    }

    async fn clear_store(&self, _schema: &CacheSchema, _store: &str) -> CacheResult<()> {
        Ok(())
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in the store.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Stamped {
        time_cached: Option<DateTime<Utc>>,
    }

    impl CacheItem for Stamped {
        fn time_cached(&self) -> Option<DateTime<Utc>> {
            self.time_cached
        }

        fn set_time_cached(&mut self, cached_at: DateTime<Utc>) {
            self.time_cached = Some(cached_at);
        }
    }

    #[test]
    fn test_unstamped_item_is_expired() {
        let item = Stamped { time_cached: None };
        assert!(item.is_expired(Duration::from_secs(3600)));
    }

    #[test]
    fn test_fresh_item_is_not_expired() {
        let item = Stamped {
            time_cached: Some(Utc::now()),
        };
        assert!(!item.is_expired(Duration::from_secs(60)));
    }

    #[test]
    fn test_future_stamp_is_not_expired() {
        let item = Stamped {
            time_cached: Some(Utc::now() + chrono::Duration::seconds(120)),
        };
        assert!(!item.is_expired(Duration::from_secs(60)));
        assert!(!item.is_expired(Duration::ZERO));
    }

    #[test]
    fn test_old_item_is_expired() {
        let item = Stamped {
            time_cached: Some(Utc::now() - chrono::Duration::seconds(600)),
        };
        assert!(item.is_expired(Duration::from_secs(300)));
        assert!(!item.is_expired(Duration::from_secs(3600)));
    }

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            entry_count: 0,
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty = CacheStats::default();
        assert!((empty.hit_rate() - 0.0).abs() < 0.001);
    }
}
