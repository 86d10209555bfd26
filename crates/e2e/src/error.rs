//! Error types for the driver and runner

use flowprobe_engine::FlowError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("Target {url} unreachable after {attempts} attempts")]
    Unreachable { url: String, attempts: usize },

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright bridge error: {0}")]
    Bridge(String),

    #[error("Suite parse error: {0}")]
    SuiteParse(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

impl From<E2eError> for FlowError {
    fn from(e: E2eError) -> Self {
        match e {
            E2eError::Flow(inner) => inner,
            other => FlowError::Driver(other.to_string()),
        }
    }
}
