//! Cache schema declarations.
//!
//! A schema names a versioned database and declares the store tables it
//! contains. Stores can only be acquired for names declared here; the
//! backend creates declared tables when the version advances.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CacheResult, ConfigurationError};

/// Metadata for one store table within a schema.
///
/// The optional key field is a hint for backends whose tables are keyed
/// by a record field rather than an external string key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDescriptor {
    /// Field of the stored record to use as the table key, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_field: Option<String>,
}

/// Versioned declaration of a named cache and its store tables.
///
/// The `name` doubles as the identifier of the underlying database; the
/// `version` drives additive table creation on upgrade.
///
/// # Example
///
/// ```
/// use stash_core::CacheSchema;
///
/// let schema = CacheSchema::new("contacts", 1)
///     .with_store("people")
///     .with_store("photos");
/// assert!(schema.has_store("people"));
/// schema.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSchema {
    /// Version number of the cache, used for upgrades. Must be >= 1.
    pub version: u32,
    /// Name of the cache; identifies the underlying database.
    pub name: String,
    /// Stores declared in this cache, by name.
    pub stores: BTreeMap<String, StoreDescriptor>,
}

impl CacheSchema {
    /// Create a schema with no stores declared yet.
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            version,
            name: name.into(),
            stores: BTreeMap::new(),
        }
    }

    /// Declare a store with an empty descriptor.
    pub fn with_store(mut self, name: impl Into<String>) -> Self {
        self.stores.insert(name.into(), StoreDescriptor::default());
        self
    }

    /// Declare a store with an explicit descriptor.
    pub fn with_store_descriptor(
        mut self,
        name: impl Into<String>,
        descriptor: StoreDescriptor,
    ) -> Self {
        self.stores.insert(name.into(), descriptor);
        self
    }

    /// Check whether a store name is declared in this schema.
    pub fn has_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Iterate the declared store names.
    pub fn store_names(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    /// Validate the schema.
    ///
    /// Validates:
    /// - `version` >= 1
    /// - `name` is non-empty
    pub fn validate(&self) -> CacheResult<()> {
        if self.version < 1 {
            return Err(ConfigurationError::InvalidValue {
                field: "version".to_string(),
                value: self.version.to_string(),
                reason: "schema version must be at least 1".to_string(),
            }
            .into());
        }

        if self.name.is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "name".to_string(),
                value: String::new(),
                reason: "schema name must not be empty".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
