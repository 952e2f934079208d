//! STASH Core - Schema, Configuration, and Session Types
//!
//! Pure data types with validation; no storage behavior. The cache
//! implementation lives in stash-store and depends on this crate.

pub mod config;
pub mod error;
pub mod schema;
pub mod session;

pub use config::{CacheConfig, CacheOptions};
pub use error::{CacheError, CacheResult, ConfigurationError, StorageError};
pub use schema::{CacheSchema, StoreDescriptor};
pub use session::{is_sign_out_transition, SessionState};
