//! Integration tests for rule authorization of partial configs.
//!
//! Covers:
//! - same-origin references bypass rules
//! - cross-origin references need a matching Allow rule
//! - Unknown origin is never denied
//! - first matching Allow wins; Deny rules are inert
//! - duplicate repository fingerprints

use pipeconf_core::{
    merge_partials, validate_config_repos, ConfigOrigin, ConfigRepoConfig, ConfigValidator,
    EnvironmentConfig, ErrorCategory, MainConfig, MergedConfig, PartialConfig,
    PartialConfigAuthority, PipelineConfig, PipelineGroup, ResourceType, Rule, Rules, ScmMaterial,
};

fn groups_and_envs() -> Rules {
    Rules::new()
        .with_rule(Rule::allow(ResourceType::PipelineGroup, "*"))
        .with_rule(Rule::allow(ResourceType::Environment, "*"))
}

fn repo(id: &str, rules: Rules) -> ConfigRepoConfig {
    ConfigRepoConfig::new(id, "json", ScmMaterial::new("git", format!("fp-{id}"))).with_rules(rules)
}

fn fragment(repo: &ConfigRepoConfig, group: &str, pipelines: Vec<PipelineConfig>) -> PartialConfig {
    let group = pipelines
        .into_iter()
        .fold(PipelineGroup::new(group), PipelineGroup::with_pipeline);
    PartialConfig::new(repo.origin_at("1")).with_group(group)
}

/// R1 owns `build` and allows referring to it; R2 has no pipeline rule.
fn scenario(r2_rules: Rules) -> MergedConfig {
    let r1 = repo(
        "R1",
        groups_and_envs().with_rule(Rule::allow(ResourceType::Pipeline, "build")),
    );
    let r2 = repo("R2", r2_rules);
    let p1 = fragment(
        &r1,
        "r1-group",
        vec![
            PipelineConfig::new("build").with_stage("compile"),
            PipelineConfig::new("r1-test").depends_on("build", "compile"),
        ],
    );
    let p2 = fragment(
        &r2,
        "r2-group",
        vec![PipelineConfig::new("r2-deploy").depends_on("build", "compile")],
    );
    let main = MainConfig::new().with_config_repo(r1).with_config_repo(r2);
    merge_partials(&main, &[p1, p2])
}

#[test]
fn same_origin_reference_is_allowed_without_rules() {
    let r1 = repo("R1", groups_and_envs());
    let partial = fragment(
        &r1,
        "g",
        vec![
            PipelineConfig::new("build").with_stage("compile"),
            PipelineConfig::new("test").depends_on("build", "compile"),
        ],
    );
    let merged = merge_partials(&MainConfig::new().with_config_repo(r1), &[partial]);
    assert!(PartialConfigAuthority::new(&merged).authorize_all().is_empty());
}

#[test]
fn cross_origin_reference_without_rule_is_denied() {
    let merged = scenario(groups_and_envs());
    let violations = PartialConfigAuthority::new(&merged).authorize_all();
    assert_eq!(violations.len(), 1);
    let v = &violations[0];
    assert_eq!(v.origin.repo_id(), Some("R2"));
    assert_eq!(v.resource_type, ResourceType::Pipeline);
    assert_eq!(v.name, "build");
    assert_eq!(v.entity, "r2-deploy");

    let report = ConfigValidator::new().validate(&merged).unwrap();
    let rule_errors: Vec<_> = report.errors_in(ErrorCategory::Rule).collect();
    assert_eq!(rule_errors.len(), 1);
    assert_eq!(rule_errors[0].field, "pipeline");
    assert_eq!(
        rule_errors[0].message,
        "Not allowed to refer to pipeline 'build'. Check the 'Rules' of this config repository."
    );
}

#[test]
fn matching_rule_on_referencing_repo_permits_reference() {
    let merged = scenario(groups_and_envs().with_rule(Rule::allow(ResourceType::Pipeline, "build")));
    assert!(PartialConfigAuthority::new(&merged).authorize_all().is_empty());
    assert!(ConfigValidator::new().validate(&merged).unwrap().is_valid());
}

#[test]
fn reference_to_local_pipeline_needs_rule() {
    let r1 = repo("R1", groups_and_envs());
    let partial = fragment(
        &r1,
        "g",
        vec![PipelineConfig::new("remote").depends_on("local", "build")],
    );
    let main = MainConfig::new()
        .with_group(PipelineGroup::new("lg").with_pipeline(PipelineConfig::new("local").with_stage("build")))
        .with_config_repo(r1);
    let merged = merge_partials(&main, &[partial]);
    let violations = PartialConfigAuthority::new(&merged).authorize_all();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].name, "local");
}

#[test]
fn unknown_origin_is_never_denied() {
    let partial = PartialConfig::new(ConfigOrigin::Unknown)
        .with_group(
            PipelineGroup::new("anything")
                .with_pipeline(PipelineConfig::new("preflight").depends_on("local", "build")),
        )
        .with_environment(EnvironmentConfig::new("prod"));
    let main = MainConfig::new().with_group(
        PipelineGroup::new("lg").with_pipeline(PipelineConfig::new("local").with_stage("build")),
    );
    let merged = merge_partials(&main, &[partial]);
    let authority = PartialConfigAuthority::new(&merged);
    assert!(authority.authorize(&merged.partials()[0]).is_none());
    assert!(ConfigValidator::new().validate(&merged).unwrap().is_valid());
}

#[test]
fn first_allow_in_declaration_order_decides() {
    let rules = Rules::new()
        .with_rule(Rule::allow(ResourceType::Pipeline, "build"))
        .with_rule(Rule::allow(ResourceType::Pipeline, "*"));
    assert_eq!(
        rules.first_allow(ResourceType::Pipeline, "build").unwrap().pattern,
        "build"
    );
    assert_eq!(
        rules.first_allow(ResourceType::Pipeline, "other").unwrap().pattern,
        "*"
    );
}

#[test]
fn deny_rules_do_not_block_references() {
    let merged = scenario(
        groups_and_envs()
            .with_rule(Rule::deny(ResourceType::Pipeline, "build"))
            .with_rule(Rule::allow(ResourceType::Pipeline, "*")),
    );
    assert!(PartialConfigAuthority::new(&merged).authorize_all().is_empty());
}

#[test]
fn repo_without_registration_is_checked_with_empty_rules() {
    // The fragment's repo id is not registered, but its fingerprint is, so
    // the merge keeps it and authorization has no rules to consult.
    let registered = repo("R1", Rules::allow_all());
    let stray = PartialConfig::new(ConfigOrigin::repo("R9", "fp-R1", "1"))
        .with_group(PipelineGroup::new("g"));
    let merged = merge_partials(&MainConfig::new().with_config_repo(registered), &[stray]);
    let violations = PartialConfigAuthority::new(&merged).authorize_all();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].resource_type, ResourceType::PipelineGroup);
}

#[test]
fn duplicate_material_fingerprint_is_keyed_material() {
    let a = ConfigRepoConfig::new("repo-1", "json", ScmMaterial::new("git", "fp-A"));
    let b = ConfigRepoConfig::new("repo-2", "yaml", ScmMaterial::new("git", "fp-A"));
    let main = MainConfig::new().with_config_repo(a).with_config_repo(b);
    let merged = MergedConfig::from_main(&main);

    let errors = validate_config_repos(merged.config_repos(), &merged);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "material");
    assert_eq!(errors[0].entity, "repo-2");
    assert!(errors[0].message.contains("fp-A"));

    let report = ConfigValidator::new().validate(&merged).unwrap();
    assert_eq!(report.len(), 1);
}
