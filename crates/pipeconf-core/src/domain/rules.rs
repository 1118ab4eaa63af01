//! Per-repository reference rules.
//!
//! A config repository may only refer to pipeline groups, environments and
//! pipelines of other origins that one of its `Allow` rules matches. Rules are
//! evaluated in declaration order and the first matching `Allow` decides.
//! `Deny` rules are accepted and stored but never deny anything.

use serde::{Deserialize, Serialize};

/// The only action rules currently speak about.
pub const REFER: &str = "refer";

/// Matches any name.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    PipelineGroup,
    Pipeline,
    Environment,
}

impl ResourceType {
    /// Field key used on findings, e.g. `pipeline_group`.
    pub fn key(&self) -> &'static str {
        match self {
            ResourceType::PipelineGroup => "pipeline_group",
            ResourceType::Pipeline => "pipeline",
            ResourceType::Environment => "environment",
        }
    }

    /// Human-readable form, e.g. `pipeline group`.
    pub fn label(&self) -> &'static str {
        match self {
            ResourceType::PipelineGroup => "pipeline group",
            ResourceType::Pipeline => "pipeline",
            ResourceType::Environment => "environment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Directive {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub directive: Directive,
    pub action: String,
    pub resource: ResourceType,
    /// `*` or an exact, case-sensitive name.
    pub pattern: String,
}

impl Rule {
    pub fn allow(resource: ResourceType, pattern: impl Into<String>) -> Self {
        Self {
            directive: Directive::Allow,
            action: REFER.to_string(),
            resource,
            pattern: pattern.into(),
        }
    }

    pub fn deny(resource: ResourceType, pattern: impl Into<String>) -> Self {
        Self {
            directive: Directive::Deny,
            action: REFER.to_string(),
            resource,
            pattern: pattern.into(),
        }
    }

    /// Whether the rule speaks about `action` on `resource` named `name`.
    /// The directive is not considered.
    pub fn matches(&self, action: &str, resource: ResourceType, name: &str) -> bool {
        self.action == action
            && self.resource == resource
            && (self.pattern == WILDCARD || self.pattern == name)
    }
}

/// Ordered rule list of one config repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rules(Vec<Rule>);

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow referring to anything.
    pub fn allow_all() -> Self {
        Self::new()
            .with_rule(Rule::allow(ResourceType::PipelineGroup, WILDCARD))
            .with_rule(Rule::allow(ResourceType::Environment, WILDCARD))
            .with_rule(Rule::allow(ResourceType::Pipeline, WILDCARD))
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.0.push(rule);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First `Allow` rule, in declaration order, permitting a reference to
    /// `name`.
    pub fn first_allow(&self, resource: ResourceType, name: &str) -> Option<&Rule> {
        self.0
            .iter()
            .filter(|rule| rule.directive == Directive::Allow)
            .find(|rule| rule.matches(REFER, resource, name))
    }

    pub fn can_refer(&self, resource: ResourceType, name: &str) -> bool {
        self.first_allow(resource, name).is_some()
    }
}

impl FromIterator<Rule> for Rules {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Rules(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_and_exact_matching() {
        let rule = Rule::allow(ResourceType::Pipeline, "build");
        assert!(rule.matches(REFER, ResourceType::Pipeline, "build"));
        assert!(!rule.matches(REFER, ResourceType::Pipeline, "Build"));
        assert!(!rule.matches(REFER, ResourceType::Environment, "build"));
        assert!(!rule.matches("view", ResourceType::Pipeline, "build"));

        let any = Rule::allow(ResourceType::Pipeline, WILDCARD);
        assert!(any.matches(REFER, ResourceType::Pipeline, "whatever"));
    }

    #[test]
    fn first_matching_allow_wins_in_declaration_order() {
        let rules = Rules::new()
            .with_rule(Rule::allow(ResourceType::Pipeline, WILDCARD))
            .with_rule(Rule::allow(ResourceType::Pipeline, "build"));
        assert_eq!(rules.first_allow(ResourceType::Pipeline, "build").unwrap().pattern, "*");

        let reversed = Rules::new()
            .with_rule(Rule::allow(ResourceType::Pipeline, "build"))
            .with_rule(Rule::allow(ResourceType::Pipeline, WILDCARD));
        assert_eq!(
            reversed.first_allow(ResourceType::Pipeline, "build").unwrap().pattern,
            "build"
        );
    }

    #[test]
    fn deny_rules_never_deny() {
        let rules = Rules::new()
            .with_rule(Rule::deny(ResourceType::Pipeline, "build"))
            .with_rule(Rule::allow(ResourceType::Pipeline, "build"));
        assert!(rules.can_refer(ResourceType::Pipeline, "build"));

        let deny_only = Rules::new().with_rule(Rule::deny(ResourceType::Pipeline, WILDCARD));
        assert!(!deny_only.can_refer(ResourceType::Pipeline, "build"));
        assert!(deny_only.first_allow(ResourceType::Pipeline, "build").is_none());
    }

    #[test]
    fn serde_uses_snake_case_resource_names() {
        let rules: Rules = serde_json::from_str(
            r#"[{"directive":"allow","action":"refer","resource":"pipeline_group","pattern":"*"}]"#,
        )
        .unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules.can_refer(ResourceType::PipelineGroup, "anything"));
    }
}
