//! Cache configuration types.
//!
//! Configuration is advisory: the store stamps write times but never
//! enforces expiry or the enabled flags itself. Callers consult these
//! settings when deciding whether to trust a read.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-category cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Whether this category of the cache is enabled.
    pub is_enabled: bool,
    /// Maximum age before a read should be considered stale.
    /// `None` falls back to the global default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidation_period: Option<Duration>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            is_enabled: true,
            invalidation_period: None,
        }
    }
}

/// Global cache configuration with per-category blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Controls whether the cache is enabled globally.
    pub is_enabled: bool,
    /// Default invalidation period for categories without their own.
    pub default_invalidation_period: Duration,
    /// Cache options for the groups store.
    pub groups: CacheOptions,
    /// Cache options for the people store.
    pub people: CacheOptions,
    /// Cache options for the users store.
    pub users: CacheOptions,
    /// Cache options for the photos store.
    pub photos: CacheOptions,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            is_enabled: true,
            default_invalidation_period: Duration::from_secs(3600),
            groups: CacheOptions::default(),
            people: CacheOptions::default(),
            users: CacheOptions::default(),
            photos: CacheOptions::default(),
        }
    }
}

impl CacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the cache globally.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.is_enabled = enabled;
        self
    }

    /// Set the global default invalidation period.
    pub fn with_default_invalidation_period(mut self, period: Duration) -> Self {
        self.default_invalidation_period = period;
        self
    }

    /// Replace the options for the groups store.
    pub fn with_groups(mut self, options: CacheOptions) -> Self {
        self.groups = options;
        self
    }

    /// Replace the options for the people store.
    pub fn with_people(mut self, options: CacheOptions) -> Self {
        self.people = options;
        self
    }

    /// Replace the options for the users store.
    pub fn with_users(mut self, options: CacheOptions) -> Self {
        self.users = options;
        self
    }

    /// Replace the options for the photos store.
    pub fn with_photos(mut self, options: CacheOptions) -> Self {
        self.photos = options;
        self
    }

    /// Whether a category is effectively enabled: the global gate AND the
    /// category gate must both be on.
    pub fn store_enabled(&self, options: &CacheOptions) -> bool {
        self.is_enabled && options.is_enabled
    }

    /// The effective invalidation period for a category: its own period,
    /// or the global default.
    pub fn invalidation_period(&self, options: &CacheOptions) -> Duration {
        options
            .invalidation_period
            .unwrap_or(self.default_invalidation_period)
    }
}
