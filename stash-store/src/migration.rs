//! Pure schema upgrade planning.
//!
//! Planning is separated from the backend connection so it can be tested
//! without touching LMDB. A plan only ever creates tables; upgrades are
//! additive and never drop existing data.

use stash_core::CacheSchema;

/// The tables to create when moving a database to a schema version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    /// The version currently recorded in the database, if any.
    pub from: Option<u32>,
    /// The version the schema declares.
    pub to: u32,
    /// Store tables to create. Creation is idempotent: tables that
    /// already exist are left untouched.
    pub create_stores: Vec<String>,
}

/// Decide whether a database at `current` needs an upgrade to `schema`.
///
/// Returns None when the recorded version already matches or exceeds the
/// schema version. A database with no recorded version is treated as new
/// and gets every declared store.
pub fn plan_upgrade(current: Option<u32>, schema: &CacheSchema) -> Option<MigrationPlan> {
    match current {
        Some(version) if version >= schema.version => None,
        _ => Some(MigrationPlan {
            from: current,
            to: schema.version,
            create_stores: schema.store_names().map(str::to_string).collect(),
        }),
    }
}
