//! Cache of fetched partial configurations.
//!
//! Keeps two sets keyed by repository fingerprint: the latest fragment
//! fetched from each repository (`last_known`), and the latest set that
//! produced a valid merged configuration (`last_valid`). When the known set
//! breaks the merge, the loader falls back to the valid one.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::PartialConfig;

#[derive(Debug, Clone, Default)]
pub struct CachedPartials {
    last_known: BTreeMap<String, PartialConfig>,
    last_valid: BTreeMap<String, PartialConfig>,
}

fn cache_key(partial: &PartialConfig) -> String {
    partial
        .origin
        .fingerprint()
        .map(str::to_string)
        .unwrap_or_else(|| partial.origin.display_name())
}

impl CachedPartials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly parsed fragment, replacing the previous one from the
    /// same repository.
    pub fn add_or_update(&mut self, partial: PartialConfig) {
        let key = cache_key(&partial);
        debug!(repo = %key, origin = %partial.origin, "caching partial config");
        self.last_known.insert(key, partial);
    }

    /// Forget a repository's fragments, e.g. after it was unregistered.
    pub fn remove(&mut self, fingerprint: &str) {
        self.last_known.remove(fingerprint);
        self.last_valid.remove(fingerprint);
    }

    /// Promote every known fragment to valid.
    pub fn mark_all_valid(&mut self) {
        self.last_valid = self.last_known.clone();
    }

    /// Promote the known fragment of one repository.
    pub fn mark_valid(&mut self, fingerprint: &str) {
        if let Some(partial) = self.last_known.get(fingerprint) {
            self.last_valid
                .insert(fingerprint.to_string(), partial.clone());
        }
    }

    pub fn last_known(&self) -> Vec<PartialConfig> {
        self.last_known.values().cloned().collect()
    }

    pub fn last_valid(&self) -> Vec<PartialConfig> {
        self.last_valid.values().cloned().collect()
    }

    /// Whether the valid set differs from the known set.
    pub fn has_fallback(&self) -> bool {
        self.last_known != self.last_valid
    }

    pub fn clear(&mut self) {
        self.last_known.clear();
        self.last_valid.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConfigOrigin, PipelineConfig, PipelineGroup};

    fn fragment(fp: &str, revision: &str, pipeline: &str) -> PartialConfig {
        PartialConfig::new(ConfigOrigin::repo("r", fp, revision))
            .with_group(PipelineGroup::new("g").with_pipeline(PipelineConfig::new(pipeline)))
    }

    #[test]
    fn update_replaces_fragment_of_same_repo() {
        let mut cache = CachedPartials::new();
        cache.add_or_update(fragment("fp-1", "1", "a"));
        cache.add_or_update(fragment("fp-1", "2", "b"));
        let known = cache.last_known();
        assert_eq!(known.len(), 1);
        assert_eq!(known[0].pipelines().next().unwrap().name, "b");
        assert!(cache.last_valid().is_empty());
    }

    #[test]
    fn valid_set_lags_until_marked() {
        let mut cache = CachedPartials::new();
        cache.add_or_update(fragment("fp-1", "1", "a"));
        cache.mark_all_valid();
        cache.add_or_update(fragment("fp-1", "2", "b"));
        assert!(cache.has_fallback());
        assert_eq!(cache.last_valid()[0].pipelines().next().unwrap().name, "a");

        cache.mark_valid("fp-1");
        assert!(!cache.has_fallback());
    }

    #[test]
    fn remove_forgets_both_sets() {
        let mut cache = CachedPartials::new();
        cache.add_or_update(fragment("fp-1", "1", "a"));
        cache.mark_all_valid();
        cache.remove("fp-1");
        assert!(cache.last_known().is_empty());
        assert!(cache.last_valid().is_empty());
    }
}
