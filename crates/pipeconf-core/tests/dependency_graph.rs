//! Integration tests for dependency-graph validation over merged configs.
//!
//! Covers:
//! - A -> B -> C -> A reported as one cycle, in path order
//! - self-dependency as a one-element cycle
//! - cycles spanning the primary config and a partial fragment
//! - missing upstream pipelines and stages

use pipeconf_core::{
    merge_partials, validate_dependencies, ConfigError, ConfigRepoConfig, ConfigValidator,
    MainConfig, PartialConfig, PipelineConfig, PipelineGroup, Rules, ScmMaterial,
};

fn pipeline(name: &str) -> PipelineConfig {
    PipelineConfig::new(name).with_stage("stage")
}

fn local(pipelines: Vec<PipelineConfig>) -> MainConfig {
    let group = pipelines
        .into_iter()
        .fold(PipelineGroup::new("group"), PipelineGroup::with_pipeline);
    MainConfig::new().with_group(group)
}

#[test]
fn three_pipeline_cycle_is_reported_in_order() {
    let main = local(vec![
        pipeline("A").depends_on("B", "stage"),
        pipeline("B").depends_on("C", "stage"),
        pipeline("C").depends_on("A", "stage"),
    ]);
    let merged = merge_partials(&main, &[]);
    let err = validate_dependencies(&merged).unwrap_err();
    assert!(matches!(err, ConfigError::CycleDetected { .. }));
    assert_eq!(err.to_string(), "Circular dependency: A <- B <- C <- A");
}

#[test]
fn self_dependency_is_a_cycle() {
    let main = local(vec![pipeline("A").depends_on("A", "stage")]);
    let err = validate_dependencies(&merge_partials(&main, &[])).unwrap_err();
    assert_eq!(err.to_string(), "Circular dependency: A <- A");
}

#[test]
fn acyclic_graph_validates_and_orders_upstream_first() {
    let main = local(vec![
        pipeline("deploy").depends_on("test", "stage"),
        pipeline("test").depends_on("build", "stage"),
        pipeline("build"),
        pipeline("lint"),
    ]);
    let order = validate_dependencies(&merge_partials(&main, &[])).unwrap();
    let pos = |n: &str| order.iter().position(|p| p == n).unwrap();
    assert_eq!(order.len(), 4);
    assert!(pos("build") < pos("test"));
    assert!(pos("test") < pos("deploy"));
}

#[test]
fn cycle_through_partial_fragment_aborts_validation() {
    let repo = ConfigRepoConfig::new("r1", "json", ScmMaterial::new("git", "fp-1"))
        .with_rules(Rules::allow_all());
    let partial = PartialConfig::new(repo.origin_at("1")).with_group(
        PipelineGroup::new("remote").with_pipeline(pipeline("remote").depends_on("local", "stage")),
    );
    let main = local(vec![pipeline("local").depends_on("remote", "stage")]).with_config_repo(repo);

    let merged = merge_partials(&main, &[partial]);
    let err = ConfigValidator::new().validate(&merged).unwrap_err();
    assert!(err.is_graph_error());
    assert!(err.to_string().starts_with("Circular dependency: "));
    assert!(err.to_string().contains("local"));
    assert!(err.to_string().contains("remote"));
}

#[test]
fn missing_upstream_aborts_with_parent_context() {
    let main = local(vec![pipeline("down").depends_on("ghost", "stage")]);
    let err = ConfigValidator::new()
        .validate(&merge_partials(&main, &[]))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Pipeline \"ghost\" does not exist. It is used from pipeline \"down\"."
    );
}

#[test]
fn missing_stage_is_a_field_error_not_an_abort() {
    let main = local(vec![
        pipeline("up"),
        pipeline("down").depends_on("up", "no-such-stage"),
    ]);
    let report = ConfigValidator::new()
        .validate(&merge_partials(&main, &[]))
        .unwrap();
    let errors: Vec<_> = report.errors_for("down").collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "stage");
    assert!(errors[0]
        .message
        .starts_with("Stage with name 'no-such-stage' does not exist on pipeline 'up'"));
}
