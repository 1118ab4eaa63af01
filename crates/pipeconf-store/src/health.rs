//! Loose-object health signal.
//!
//! The history repository slows down as loose objects pile up. The monitor
//! turns successive loose-object counts into edge-triggered warnings so a
//! caller can raise an operator notice once and clear it once.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::ConfigStore;
use crate::Result;

/// Outcome of one loose-object observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GcHealth {
    Healthy { count: u64, threshold: u64 },
    /// Count crossed the threshold on this observation.
    Raised { count: u64, threshold: u64 },
    /// Count is still above the threshold.
    StillRaised { count: u64, threshold: u64 },
    /// Count dropped back below the threshold after a warning.
    Cleared { count: u64, threshold: u64 },
}

impl GcHealth {
    /// One-off reading with no warning history: `Raised` above the
    /// threshold, `Healthy` otherwise.
    pub fn assess(count: u64, threshold: u64) -> Self {
        if count > threshold {
            GcHealth::Raised { count, threshold }
        } else {
            GcHealth::Healthy { count, threshold }
        }
    }

    pub fn count(&self) -> u64 {
        match *self {
            GcHealth::Healthy { count, .. }
            | GcHealth::Raised { count, .. }
            | GcHealth::StillRaised { count, .. }
            | GcHealth::Cleared { count, .. } => count,
        }
    }

    pub fn needs_attention(&self) -> bool {
        matches!(self, GcHealth::Raised { .. } | GcHealth::StillRaised { .. })
    }

    /// Operator-facing message for warning states.
    pub fn message(&self) -> Option<String> {
        match self {
            GcHealth::Raised { count, threshold } | GcHealth::StillRaised { count, threshold } => {
                Some(format!(
                    "Action required: the configuration history repository has {count} loose objects \
                     (threshold {threshold}). Run 'git gc' on it or enable periodic GC."
                ))
            }
            _ => None,
        }
    }
}

/// Edge-triggered loose-object warning.
#[derive(Debug, Default)]
pub struct LooseObjectMonitor {
    raised: bool,
}

impl LooseObjectMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_raised(&self) -> bool {
        self.raised
    }

    pub fn observe(&mut self, count: u64, threshold: u64) -> GcHealth {
        let above = count > threshold;
        let health = match (self.raised, above) {
            (false, false) => GcHealth::Healthy { count, threshold },
            (false, true) => {
                warn!(count, threshold, "loose object count above threshold");
                GcHealth::Raised { count, threshold }
            }
            (true, true) => GcHealth::StillRaised { count, threshold },
            (true, false) => {
                info!(count, threshold, "loose object count back under threshold");
                GcHealth::Cleared { count, threshold }
            }
        };
        self.raised = above;
        health
    }

    /// Observe the store's current count against its configured threshold.
    pub fn check(&mut self, store: &ConfigStore) -> Result<GcHealth> {
        let count = store.loose_object_count()?;
        Ok(self.observe(count, store.settings().loose_object_warning_threshold))
    }
}
