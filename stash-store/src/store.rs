//! Typed store bound to one table of a versioned schema.
//!
//! A store is acquired through the registry and offers get/put/clear
//! over the persistent backend. Every write stamps the record with the
//! current time; reads return the record with the stamp restored from
//! the stored bytes, so a caller-supplied stamp can never survive a
//! round trip.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use stash_core::{CacheResult, CacheSchema, ConfigurationError, StorageError};

use crate::traits::{CacheItem, StoreBackend};

/// Width of the timestamp prefix on stored values.
const TIMESTAMP_LEN: usize = 8;

/// A typed accessor for one named store within a schema.
///
/// Operations degrade to no-ops/`None` when the backend reports that
/// persistent storage is unavailable; a missing key is never an error.
pub struct Store<T: CacheItem> {
    schema: CacheSchema,
    store_name: String,
    backend: Arc<dyn StoreBackend>,
    _item: PhantomData<fn() -> T>,
}

impl<T: CacheItem> Store<T> {
    /// Create a store bound to `store_name` within `schema`.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error if the schema is invalid or the
    /// store name is not declared in `schema.stores`.
    pub fn new(
        schema: CacheSchema,
        store_name: &str,
        backend: Arc<dyn StoreBackend>,
    ) -> CacheResult<Self> {
        schema.validate()?;

        if !schema.has_store(store_name) {
            return Err(ConfigurationError::StoreNotInSchema {
                store: store_name.to_string(),
                schema: schema.name.clone(),
            }
            .into());
        }

        Ok(Self {
            schema,
            store_name: store_name.to_string(),
            backend,
            _item: PhantomData,
        })
    }

    /// The schema this store belongs to.
    pub fn schema(&self) -> &CacheSchema {
        &self.schema
    }

    /// The name of this store's table.
    pub fn name(&self) -> &str {
        &self.store_name
    }

    /// Get the value cached under `key`.
    ///
    /// Returns `None` when the key was never written or the backend is
    /// unavailable. The returned record's `time_cached` reflects when
    /// the value was written, regardless of what was stored inside it.
    pub async fn get(&self, key: &str) -> CacheResult<Option<T>> {
        if !self.backend.is_available() {
            return Ok(None);
        }

        let bytes = self
            .backend
            .get_raw(&self.schema, &self.store_name, key)
            .await?;

        match bytes {
            Some(bytes) => decode_value(&bytes),
            None => Ok(None),
        }
    }

    /// Write `item` under `key`, overwriting any prior value.
    ///
    /// The record's `time_cached` is stamped with the current time
    /// before serialization; a caller-supplied stamp is ignored. No-op
    /// when the backend is unavailable. Concurrent puts to the same key
    /// are last-write-wins under the backend's own serialization.
    pub async fn put(&self, key: &str, item: &T) -> CacheResult<()> {
        if !self.backend.is_available() {
            return Ok(());
        }

        let bytes = encode_value(item, Utc::now())?;
        self.backend
            .put_raw(&self.schema, &self.store_name, key, bytes)
            .await
    }

    /// Remove every entry in this store's table.
    ///
    /// No-op when the backend is unavailable.
    pub async fn clear(&self) -> CacheResult<()> {
        if !self.backend.is_available() {
            return Ok(());
        }

        self.backend
            .clear_store(&self.schema, &self.store_name)
            .await
    }
}

/// Serialize a record as `[timestamp millis: 8 bytes LE][JSON body]`.
///
/// The stamp is written both into the prefix and into the record itself,
/// so the serialized body already carries the authoritative time.
fn encode_value<T: CacheItem>(item: &T, cached_at: DateTime<Utc>) -> CacheResult<Vec<u8>> {
    let mut stamped = item.clone();
    stamped.set_time_cached(cached_at);

    let body = serde_json::to_vec(&stamped).map_err(|e| StorageError::Serialization {
        reason: e.to_string(),
    })?;

    let mut bytes = Vec::with_capacity(TIMESTAMP_LEN + body.len());
    bytes.extend_from_slice(&cached_at.timestamp_millis().to_le_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Deserialize a record, restoring `time_cached` from the prefix.
///
/// Values too short to carry a prefix decode as `None` rather than an
/// error.
fn decode_value<T: CacheItem>(bytes: &[u8]) -> CacheResult<Option<T>> {
    if bytes.len() < TIMESTAMP_LEN {
        return Ok(None);
    }

    let millis = i64::from_le_bytes(
        bytes[..TIMESTAMP_LEN]
            .try_into()
            .map_err(|_| StorageError::Deserialization {
                reason: "invalid timestamp prefix".to_string(),
            })?,
    );
    let cached_at = DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now);

    let mut item: T =
        serde_json::from_slice(&bytes[TIMESTAMP_LEN..]).map_err(|e| {
            StorageError::Deserialization {
                reason: e.to_string(),
            }
        })?;
    item.set_time_cached(cached_at);

    Ok(Some(item))
}
