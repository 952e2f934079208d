//! STASH Store - Schema-Driven Cache Stores over LMDB
//!
//! This crate implements the cache subsystem: typed stores bound to one
//! named table of a versioned schema, an LMDB backend with additive
//! schema upgrades, and a registry guaranteeing one store instance per
//! schema/store pair with a session-driven flush.
//!
//! # Design Philosophy
//!
//! The cache is strictly best-effort. Every write is stamped with its
//! retrieval time, but the store never enforces expiry or the enabled
//! flags itself: callers compare the stamp against their configured
//! invalidation period and decide for themselves. Environments without
//! persistent storage degrade to silent no-ops rather than errors.
//!
//! # Example
//!
//! ```ignore
//! let backend = Arc::new(LmdbStoreBackend::new("/var/cache/stash", 100)?);
//! let registry = Arc::new(CacheRegistry::new(backend, CacheConfig::default()));
//!
//! let schema = CacheSchema::new("contacts", 1).with_store("people");
//! let people = registry.get_store::<Person>(&schema, "people")?;
//!
//! people.put("u1", &person).await?;
//! if let Some(cached) = people.get("u1").await? {
//!     let max_age = registry.config().invalidation_period(&registry.config().people);
//!     if !cached.is_expired(max_age) {
//!         // use cached
//!     }
//! }
//!
//! // At application startup, wire the registry to the session source:
//! tokio::spawn(Arc::clone(&registry).watch_sessions(session_rx));
//! ```

pub mod lmdb;
pub mod migration;
pub mod registry;
pub mod store;
pub mod traits;

pub use lmdb::{LmdbBackendError, LmdbStoreBackend};
pub use migration::{plan_upgrade, MigrationPlan};
pub use registry::CacheRegistry;
pub use store::Store;
pub use traits::{CacheItem, CacheStats, StoreBackend, UnavailableBackend};
