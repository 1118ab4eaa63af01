//! Store settings
//!
//! Garbage-collection knobs for the configuration history repository. They
//! are read when the store is opened and may be re-read before every GC
//! cycle, so operators can toggle periodic GC without a restart.

use serde::{Deserialize, Serialize};

pub const ENV_PERIODIC_GC: &str = "PIPECONF_CONFIG_REPO_PERIODIC_GC";
pub const ENV_GC_AGGRESSIVE: &str = "PIPECONF_CONFIG_REPO_GC_AGGRESSIVE";
pub const ENV_GC_EXPIRE_HOURS: &str = "PIPECONF_CONFIG_REPO_GC_EXPIRE_HOURS";
pub const ENV_GC_WARNING_THRESHOLD: &str = "PIPECONF_CONFIG_REPO_GC_WARNING_THRESHOLD";

/// Garbage collection settings for a [`crate::ConfigStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Compact loose objects when `garbage_collect` is called
    pub periodic_gc: bool,
    /// Pass `--aggressive` to `git gc`
    pub aggressive_gc: bool,
    /// Unreachable objects older than this are pruned
    pub gc_expire_hours: u64,
    /// Loose-object count above which a health warning is raised
    pub loose_object_warning_threshold: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            periodic_gc: false,
            aggressive_gc: true,
            gc_expire_hours: 24,
            loose_object_warning_threshold: 10_000,
        }
    }
}

impl StoreSettings {
    /// Create settings from environment variables
    ///
    /// Reads:
    /// - PIPECONF_CONFIG_REPO_PERIODIC_GC (default: false)
    /// - PIPECONF_CONFIG_REPO_GC_AGGRESSIVE (default: true)
    /// - PIPECONF_CONFIG_REPO_GC_EXPIRE_HOURS (default: 24)
    /// - PIPECONF_CONFIG_REPO_GC_WARNING_THRESHOLD (default: 10000)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        StoreSettings {
            periodic_gc: env_bool(ENV_PERIODIC_GC).unwrap_or(defaults.periodic_gc),
            aggressive_gc: env_bool(ENV_GC_AGGRESSIVE).unwrap_or(defaults.aggressive_gc),
            gc_expire_hours: env_u64(ENV_GC_EXPIRE_HOURS).unwrap_or(defaults.gc_expire_hours),
            loose_object_warning_threshold: env_u64(ENV_GC_WARNING_THRESHOLD)
                .unwrap_or(defaults.loose_object_warning_threshold),
        }
    }

    pub fn with_periodic_gc(mut self, enabled: bool) -> Self {
        self.periodic_gc = enabled;
        self
    }

    pub fn with_aggressive_gc(mut self, enabled: bool) -> Self {
        self.aggressive_gc = enabled;
        self
    }

    pub fn with_gc_expire_hours(mut self, hours: u64) -> Self {
        self.gc_expire_hours = hours;
        self
    }

    pub fn with_warning_threshold(mut self, threshold: u64) -> Self {
        self.loose_object_warning_threshold = threshold;
        self
    }
}

fn env_bool(key: &str) -> Option<bool> {
    parse_bool(&std::env::var(key).ok()?)
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.trim().parse().ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
