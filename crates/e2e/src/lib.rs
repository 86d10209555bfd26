//! Flowprobe E2E runner
//!
//! Connects the flow engine to a real browser and runs the scenario suites
//! against a deployed shop:
//! - Checks the target is reachable before launching anything
//! - Controls Playwright through a JSON-lines bridge process
//! - Loads extra case suites from YAML
//! - Writes a `test-results.json` report per run
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SuiteRunner                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │    ├── check_reachable(base_url)                            │
//! │    ├── PlaywrightSession::launch() | SimulatedShop::new()   │
//! │    ├── Scenarios::run_suite(name)      (built-in suites)    │
//! │    ├── CaseSuite::to_cases() + run_matrix (YAML suites)     │
//! │    └── write_results() -> test-results.json                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod playwright;
pub mod preflight;
pub mod runner;
pub mod suite;

pub use error::{E2eError, E2eResult};
pub use playwright::{Browser, PlaywrightConfig, PlaywrightSession};
pub use preflight::{check_reachable, PreflightConfig};
pub use runner::{DriverKind, RunnerConfig, SuiteResult, SuiteRunner};
pub use suite::{CaseSuite, Expectation, SuiteCase, TemplateKind};
