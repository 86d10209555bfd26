//! Suite runner: picks a driver, runs built-in and YAML suites, writes results

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use flowprobe_engine::scenarios::SUITES;
use flowprobe_engine::{FlowConfig, MatrixReport, Scenarios, SharedSession, SimulatedShop};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{E2eError, E2eResult};
use crate::playwright::{PlaywrightConfig, PlaywrightSession};
use crate::preflight::{check_reachable, PreflightConfig};
use crate::suite::CaseSuite;

/// Tag carried by every built-in suite
pub const BUILTIN_TAG: &str = "builtin";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    #[default]
    Playwright,
    /// In-process simulated shop, no browser or network
    Sim,
}

impl FromStr for DriverKind {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "playwright" => Ok(DriverKind::Playwright),
            "sim" => Ok(DriverKind::Sim),
            other => Err(E2eError::SuiteParse(format!(
                "unknown driver '{}' (expected playwright or sim)",
                other
            ))),
        }
    }
}

/// Configuration for the suite runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub flow: FlowConfig,
    pub driver: DriverKind,
    pub playwright: PlaywrightConfig,
    pub preflight: Option<PreflightConfig>,

    /// Extra YAML suites
    pub suites_dir: Option<PathBuf>,

    /// Suite names to run; empty runs everything
    pub suites: Vec<String>,

    /// Only run suites carrying this tag
    pub tag: Option<String>,

    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            flow: FlowConfig::default(),
            driver: DriverKind::default(),
            playwright: PlaywrightConfig::default(),
            preflight: Some(PreflightConfig::default()),
            suites_dir: None,
            suites: Vec::new(),
            tag: None,
            output_dir: PathBuf::from("test-results"),
        }
    }
}

impl RunnerConfig {
    fn selects(&self, name: &str, has_tag: impl Fn(&str) -> bool) -> bool {
        let by_name = self.suites.is_empty() || self.suites.iter().any(|s| s == name);
        let by_tag = self.tag.as_deref().map_or(true, has_tag);
        by_name && by_tag
    }
}

/// Result of one run, as written to `test-results.json`
#[derive(Debug, Clone, Serialize)]
pub struct SuiteResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub base_url: String,
    pub driver: DriverKind,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub suites: Vec<MatrixReport>,
}

impl SuiteResult {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

pub struct SuiteRunner {
    config: RunnerConfig,
}

impl SuiteRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Connect the configured driver and run every selected suite
    pub async fn run(&self) -> E2eResult<SuiteResult> {
        let base_url = self.config.flow.base_url.clone();

        match self.config.driver {
            DriverKind::Sim => {
                let session: SharedSession = Arc::new(SimulatedShop::new(&base_url));
                self.run_on(session).await
            }
            DriverKind::Playwright => {
                if let Some(preflight) = &self.config.preflight {
                    check_reachable(&base_url, preflight).await?;
                }

                let browser = Arc::new(PlaywrightSession::launch(self.config.playwright.clone()).await?);
                let result = self.run_on(browser.clone()).await;
                if let Err(e) = browser.close().await {
                    error!("Failed to close browser: {}", e);
                }
                result
            }
        }
    }

    /// Run every selected suite over an already connected session
    pub async fn run_on(&self, session: SharedSession) -> E2eResult<SuiteResult> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        let scenarios = Scenarios::new(session, self.config.flow.clone())?;
        let yaml_suites = match &self.config.suites_dir {
            Some(dir) => CaseSuite::load_all(dir)?,
            None => Vec::new(),
        };

        info!("Run {} against {} ({:?})", run_id, self.config.flow.base_url, self.config.driver);

        let mut reports = Vec::new();
        for name in SUITES {
            if self.config.selects(name, |t| t == BUILTIN_TAG) {
                info!("Suite '{}'", name);
                reports.push(scenarios.run_suite(name).await?);
            }
        }

        for suite in &yaml_suites {
            if !self.config.selects(&suite.name, |t| suite.has_tag(t)) {
                continue;
            }
            info!("Suite '{}' ({} case(s))", suite.name, suite.cases.len());
            let cases = suite.to_cases(&self.config.flow.messages)?;
            let template = suite.template.template(scenarios.site());
            let mut report = scenarios.run_matrix(&cases, template).await;
            report.name = suite.name.clone();
            reports.push(report);
        }

        if reports.is_empty() {
            return Err(E2eError::SuiteParse(format!(
                "no suite matches the selection (built-in: {})",
                SUITES.join(", ")
            )));
        }

        let total = reports.iter().map(|r| r.total).sum();
        let passed = reports.iter().map(|r| r.passed).sum();
        let failed = reports.iter().map(|r| r.failed).sum();
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!("Test Results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

        Ok(SuiteResult {
            run_id,
            started_at,
            base_url: self.config.flow.base_url.clone(),
            driver: self.config.driver,
            total,
            passed,
            failed,
            duration_ms,
            suites: reports,
        })
    }

    /// Write results to JSON file
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        write_results(&self.config.output_dir, results)
    }
}

pub fn write_results(output_dir: &Path, results: &SuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("test-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}
