//! flowprobe
//!
//! Runs the purchase-flow scenario suites against a shop deployment.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use flowprobe_e2e::{Browser, DriverKind, PreflightConfig, RunnerConfig, SuiteRunner};
use flowprobe_engine::FlowConfig;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "flowprobe")]
#[command(about = "Purchase-flow scenario runner for the SauceDemo shop")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "flowprobe.toml")]
    config: PathBuf,

    /// Override the configured base URL
    #[arg(long, env = "FLOWPROBE_BASE_URL")]
    base_url: Option<String>,

    /// Session driver: playwright or sim
    #[arg(long, default_value = "playwright")]
    driver: DriverKind,

    /// Suite to run (repeatable); all suites when omitted
    #[arg(short, long = "suite")]
    suites: Vec<String>,

    /// Only run suites carrying this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Directory of extra YAML case suites
    #[arg(long)]
    suites_dir: Option<PathBuf>,

    /// Output directory for test-results.json
    #[arg(short, long, default_value = "test-results")]
    output: PathBuf,

    /// Browser engine
    #[arg(long, default_value = "chromium")]
    browser: Browser,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Directory containing the playwright package
    #[arg(long, env = "FLOWPROBE_NODE_MODULES", default_value = "node_modules")]
    node_modules: PathBuf,

    /// Skip the reachability check
    #[arg(long)]
    skip_preflight: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("flowprobe v{}", flowprobe_engine::VERSION);

    let mut flow = FlowConfig::load(&cli.config)?;
    if let Some(base_url) = cli.base_url {
        flow.base_url = base_url;
        flow.validate()?;
    }

    let mut config = RunnerConfig {
        flow,
        driver: cli.driver,
        suites_dir: cli.suites_dir,
        suites: cli.suites,
        tag: cli.tag,
        output_dir: cli.output,
        ..Default::default()
    };
    config.playwright.browser = cli.browser;
    config.playwright.headless = !cli.headed;
    config.playwright.node_modules = cli.node_modules;
    config.preflight = if cli.skip_preflight {
        None
    } else {
        Some(PreflightConfig::default())
    };

    let runner = SuiteRunner::new(config);
    let results = match runner.run().await {
        Ok(results) => results,
        Err(e) => {
            error!("Run aborted: {}", e);
            return Err(e.into());
        }
    };
    runner.write_results(&results)?;

    for suite in &results.suites {
        for case in suite.results.iter().filter(|c| !c.passed) {
            error!("FAILED {} / {}", suite.name, case.diagnostic());
        }
    }

    if results.all_passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
