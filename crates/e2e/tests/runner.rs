//! Suite runner against the in-process shop
//!
//! Run with: cargo test --package flowprobe-e2e --test runner

use std::path::PathBuf;

use flowprobe_e2e::{CaseSuite, DriverKind, RunnerConfig, SuiteRunner, TemplateKind};
use flowprobe_engine::FlowConfig;
use tempfile::TempDir;

fn bundled_suites() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("suites")
}

fn sim_config(output: &TempDir) -> RunnerConfig {
    let mut flow = FlowConfig::default();
    flow.timeouts.step_ms = 300;
    flow.timeouts.outcome_ms = 300;
    flow.timeouts.poll_ms = 5;
    flow.timeouts.settle_ms = 25;

    RunnerConfig {
        flow,
        driver: DriverKind::Sim,
        preflight: None,
        output_dir: output.path().join("results"),
        ..Default::default()
    }
}

#[test]
fn bundled_suites_parse() {
    let suites = CaseSuite::load_all(&bundled_suites()).unwrap();
    let names: Vec<_> = suites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["checkout-extra", "login-extra"]);
    assert_eq!(suites[0].template, TemplateKind::Checkout);
    assert_eq!(suites[1].template, TemplateKind::Login);
}

#[test]
fn invalid_suite_names_the_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("empty.yaml"), "name: empty\ntemplate: login\ncases: []\n").unwrap();

    let err = CaseSuite::load_all(dir.path()).unwrap_err();
    assert!(err.to_string().contains("empty.yaml"), "{}", err);
}

#[tokio::test]
async fn sim_run_writes_results() {
    let output = TempDir::new().unwrap();
    let config = RunnerConfig {
        suites_dir: Some(bundled_suites()),
        ..sim_config(&output)
    };
    let runner = SuiteRunner::new(config);

    let results = runner.run().await.unwrap();
    assert!(results.all_passed(), "{:#?}", results.suites);
    assert_eq!(results.suites.len(), 7);
    assert_eq!(results.total, 27 + 3 + 4);

    let path = runner.write_results(&results).unwrap();
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["driver"], "sim");
    assert_eq!(json["passed"], 34);
    assert_eq!(json["suites"][0]["name"], "login-negative");
}

#[tokio::test]
async fn tag_selects_yaml_suites_only() {
    let output = TempDir::new().unwrap();
    let config = RunnerConfig {
        suites_dir: Some(bundled_suites()),
        tag: Some("auth".to_string()),
        ..sim_config(&output)
    };

    let results = SuiteRunner::new(config).run().await.unwrap();
    let names: Vec<_> = results.suites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["login-extra"]);
    assert_eq!(results.passed, 4);
}

#[tokio::test]
async fn builtin_suite_by_name() {
    let output = TempDir::new().unwrap();
    let config = RunnerConfig {
        suites: vec!["navigation".to_string()],
        ..sim_config(&output)
    };

    let results = SuiteRunner::new(config).run().await.unwrap();
    assert_eq!(results.suites.len(), 1);
    assert_eq!(results.suites[0].name, "navigation");
    assert!(results.all_passed());
}

#[tokio::test]
async fn empty_selection_is_an_error() {
    let output = TempDir::new().unwrap();
    let config = RunnerConfig {
        suites: vec!["does-not-exist".to_string()],
        ..sim_config(&output)
    };

    assert!(SuiteRunner::new(config).run().await.is_err());
}
