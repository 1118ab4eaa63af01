//! Full-configuration load: parse, merge with cached partials, validate.

use pipeconf_store::{ConfigStore, CURRENT};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{MainConfig, PartialConfig};
use crate::error::Result;
use crate::merge::{merge_partials, MergedConfig};
use crate::obs::{self, ReloadSpan};
use crate::parser::ConfigParser;
use crate::partials::CachedPartials;
use crate::validation::{ConfigValidator, ValidationReport};

/// Which cached partial set produced the loaded configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialSet {
    LastKnown,
    LastValid,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: MergedConfig,
    pub report: ValidationReport,
    pub used: PartialSet,
}

impl LoadedConfig {
    /// Usable when no finding is attached.
    pub fn is_valid(&self) -> bool {
        self.report.is_valid()
    }
}

pub struct ConfigLoader<P> {
    parser: P,
    validator: ConfigValidator,
}

impl<P: ConfigParser> ConfigLoader<P> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            validator: ConfigValidator::new(),
        }
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    /// Parse `content` and load it against the cached partials.
    pub fn load(&self, cache: &mut CachedPartials, content: &str) -> Result<LoadedConfig> {
        let main = self.parser.parse(content)?;
        self.load_parsed(cache, &main)
    }

    /// Merge with the last-known partials; if that is invalid, retry with
    /// the last-valid partials. A successful last-known load promotes those
    /// partials to last-valid. When the fallback fails too, the last-known
    /// outcome is returned.
    pub fn load_parsed(&self, cache: &mut CachedPartials, main: &MainConfig) -> Result<LoadedConfig> {
        let _span = ReloadSpan::enter("load");
        let known = cache.last_known();
        let primary = self.merge_and_validate(main, &known, PartialSet::LastKnown);

        if matches!(&primary, Ok(loaded) if loaded.is_valid()) {
            cache.mark_all_valid();
            return primary;
        }

        let valid = cache.last_valid();
        if valid == known {
            return primary;
        }

        match self.merge_and_validate(main, &valid, PartialSet::LastValid) {
            Ok(fallback) if fallback.is_valid() => {
                let primary_errors = match &primary {
                    Ok(loaded) => loaded.report.len(),
                    Err(_) => 1,
                };
                obs::emit_partials_fallback(known.len(), valid.len(), primary_errors);
                Ok(fallback)
            }
            _ => {
                warn!("last valid partial configs do not validate either");
                primary
            }
        }
    }

    /// Load the store's current revision. `Ok(None)` on an empty history.
    pub fn load_current(
        &self,
        store: &ConfigStore,
        cache: &mut CachedPartials,
    ) -> Result<Option<LoadedConfig>> {
        let Some(revision) = store.get_revision(CURRENT)? else {
            return Ok(None);
        };
        info!(md5 = %revision.md5, "loading current config revision");
        self.load(cache, revision.content_or_empty()).map(Some)
    }

    fn merge_and_validate(
        &self,
        main: &MainConfig,
        partials: &[PartialConfig],
        used: PartialSet,
    ) -> Result<LoadedConfig> {
        let config = merge_partials(main, partials);
        let report = self.validator.validate(&config)?;
        Ok(LoadedConfig {
            config,
            report,
            used,
        })
    }
}
