//! Registry of typed store handles over a shared backend.
//!
//! The registry hands out one `Store<T>` per `(schema, store)` pair and
//! reuses that handle for every later request, so all callers share a
//! single accessor. It also owns the session watcher: when the signed-in
//! account signs out, every store the registry has handed out is cleared.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::watch;

use stash_core::{
    is_sign_out_transition, CacheConfig, CacheResult, CacheSchema, ConfigurationError,
    SessionState, StorageError,
};

use crate::store::Store;
use crate::traits::{CacheItem, StoreBackend};

/// Type-erased handle used for bulk clears across stores of different
/// item types.
#[async_trait]
trait ErasedStore: Send + Sync {
    fn label(&self) -> String;
    async fn clear_contents(&self) -> CacheResult<()>;
}

#[async_trait]
impl<T: CacheItem> ErasedStore for Store<T> {
    fn label(&self) -> String {
        format!("{}/{}", self.schema().name, self.name())
    }

    async fn clear_contents(&self) -> CacheResult<()> {
        self.clear().await
    }
}

/// Both views of one registered store. They point at the same
/// `Arc<Store<T>>`: `typed` for downcasting back to the concrete type,
/// `erased` for clears that do not know the item type.
struct RegistryEntry {
    typed: Arc<dyn Any + Send + Sync>,
    erased: Arc<dyn ErasedStore>,
}

/// Hands out shared `Store<T>` handles and flushes them on sign-out.
///
/// # Design Philosophy
///
/// The registry is plain data with no global state: the host constructs
/// one, injects it where stores are needed, and optionally spawns
/// [`watch_sessions`](CacheRegistry::watch_sessions) against its session
/// channel. Two registries over different backends are fully
/// independent.
pub struct CacheRegistry {
    backend: Arc<dyn StoreBackend>,
    config: CacheConfig,
    stores: RwLock<HashMap<String, RegistryEntry>>,
}

impl CacheRegistry {
    /// Create a registry over `backend` with the given cache settings.
    pub fn new(backend: Arc<dyn StoreBackend>, config: CacheConfig) -> Self {
        Self {
            backend,
            config,
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// The cache settings this registry was constructed with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get the shared handle for `store_name` within `schema`, creating
    /// it on first request.
    ///
    /// Repeated calls with the same schema name and store name return
    /// clones of the same `Arc`.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error if the schema is invalid, the
    /// store is not declared in it, or the store was previously
    /// registered under a different item type.
    pub fn get_store<T: CacheItem>(
        &self,
        schema: &CacheSchema,
        store_name: &str,
    ) -> CacheResult<Arc<Store<T>>> {
        let key = format!("{}/{}", schema.name, store_name);

        {
            let stores = self.stores.read().map_err(|_| StorageError::LockPoisoned)?;
            if let Some(entry) = stores.get(&key) {
                return downcast_entry(entry, &key);
            }
        }

        let mut stores = self.stores.write().map_err(|_| StorageError::LockPoisoned)?;
        // Another caller may have registered it between the locks.
        if let Some(entry) = stores.get(&key) {
            return downcast_entry(entry, &key);
        }

        let store = Arc::new(Store::<T>::new(
            schema.clone(),
            store_name,
            Arc::clone(&self.backend),
        )?);
        stores.insert(
            key,
            RegistryEntry {
                typed: Arc::clone(&store) as Arc<dyn Any + Send + Sync>,
                erased: Arc::clone(&store) as Arc<dyn ErasedStore>,
            },
        );

        Ok(store)
    }

    /// Clear the contents of every store handed out so far.
    ///
    /// Best-effort: a store that fails to clear is logged and skipped.
    /// The handles themselves stay registered and usable. Returns the
    /// number of stores cleared.
    pub async fn clear_all_stores(&self) -> u64 {
        let targets: Vec<Arc<dyn ErasedStore>> = match self.stores.read() {
            Ok(stores) => stores.values().map(|e| Arc::clone(&e.erased)).collect(),
            Err(_) => {
                tracing::warn!("store map lock poisoned, skipping cache flush");
                return 0;
            }
        };

        let mut cleared = 0;
        for store in targets {
            match store.clear_contents().await {
                Ok(()) => cleared += 1,
                Err(e) => {
                    tracing::warn!(store = %store.label(), error = %e, "failed to clear store");
                }
            }
        }
        cleared
    }

    /// Watch `rx` for session changes and flush all stores on each
    /// signed-in to signed-out transition.
    ///
    /// Other transitions (including signing back in, or an initial load
    /// resolving to signed-out) leave caches intact. The starting state
    /// is read from the channel before this returns, so a transition
    /// that lands before the returned future is first polled is still
    /// observed as a transition. Runs until the sender side of the
    /// channel is dropped; typically spawned as a task at host startup.
    pub fn watch_sessions(
        self: Arc<Self>,
        mut rx: watch::Receiver<SessionState>,
    ) -> impl Future<Output = ()> + Send + 'static {
        let mut previous = *rx.borrow();
        async move {
            while rx.changed().await.is_ok() {
                let next = *rx.borrow_and_update();
                if is_sign_out_transition(previous, next) {
                    let cleared = self.clear_all_stores().await;
                    tracing::debug!(cleared, "session ended, flushed cached data");
                }
                previous = next;
            }
        }
    }
}

fn downcast_entry<T: CacheItem>(entry: &RegistryEntry, key: &str) -> CacheResult<Arc<Store<T>>> {
    Arc::clone(&entry.typed)
        .downcast::<Store<T>>()
        .map_err(|_| {
            ConfigurationError::StoreTypeMismatch {
                key: key.to_string(),
            }
            .into()
        })
}
