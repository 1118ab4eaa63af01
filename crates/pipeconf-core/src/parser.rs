//! Parsing seam for the primary configuration.
//!
//! The real configuration syntax is owned by another component; the core only
//! needs something that turns stored text into a [`MainConfig`].
//! [`JsonConfigParser`] reads the serde form of the domain model.

use crate::domain::{ConfigOrigin, MainConfig, PartialConfig};
use crate::error::{ConfigError, Result};

pub trait ConfigParser: Send + Sync {
    /// Parse primary configuration text. Every entity is tagged `Local`.
    fn parse(&self, content: &str) -> Result<MainConfig>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonConfigParser;

impl JsonConfigParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a fragment and tag it with `origin`, overriding any origin
    /// present in the text.
    pub fn parse_partial(&self, content: &str, origin: ConfigOrigin) -> Result<PartialConfig> {
        #[derive(serde::Deserialize)]
        struct Fragment {
            #[serde(default)]
            groups: Vec<crate::domain::PipelineGroup>,
            #[serde(default)]
            environments: Vec<crate::domain::EnvironmentConfig>,
        }

        let fragment: Fragment =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut partial = PartialConfig {
            origin,
            groups: fragment.groups,
            environments: fragment.environments,
        };
        partial.tag_entities();
        Ok(partial)
    }
}

impl ConfigParser for JsonConfigParser {
    fn parse(&self, content: &str) -> Result<MainConfig> {
        let mut config: MainConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.tag_local();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: &str = r#"{
        "groups": [
            {"name": "g1", "pipelines": [
                {"name": "build", "stages": ["compile"], "materials": [
                    {"type": "scm", "kind": "git", "fingerprint": "fp-app"}
                ]},
                {"name": "deploy", "stages": ["ship"], "materials": [
                    {"type": "dependency", "pipeline": "build", "stage": "compile"}
                ]}
            ]}
        ],
        "config_repos": [
            {"id": "r1", "plugin_id": "json", "material": {"kind": "git", "fingerprint": "fp-r1"},
             "rules": [{"directive": "allow", "action": "refer", "resource": "pipeline", "pattern": "*"}]}
        ]
    }"#;

    #[test]
    fn parses_main_config_as_local() {
        let config = JsonConfigParser::new().parse(MAIN).unwrap();
        assert_eq!(config.pipelines().count(), 2);
        assert!(config.pipelines().all(|p| p.origin.is_local()));
        assert_eq!(config.config_repos[0].rules.len(), 1);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = JsonConfigParser::new().parse("<cruise/>").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn partial_takes_supplied_origin() {
        let origin = ConfigOrigin::repo("r1", "fp-r1", "7");
        let partial = JsonConfigParser::new()
            .parse_partial(
                r#"{"groups":[{"name":"g","pipelines":[{"name":"p","origin":{"type":"local"}}]}]}"#,
                origin.clone(),
            )
            .unwrap();
        assert_eq!(partial.pipelines().next().unwrap().origin, origin);
    }
}
