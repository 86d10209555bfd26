//! Error taxonomy for flow reconciliation and outcome assertions

use thiserror::Error;

use crate::state::PageState;

/// Result type alias using the flow error
pub type FlowResult<T> = std::result::Result<T, FlowError>;

/// Everything that can abort a scenario.
///
/// None of these is retried automatically. The scenario matrix catches them
/// per case and records them as failures with diagnostics.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The site showed an inline validation error where the caller needed it
    /// to accept the input.
    #[error("Validation error shown: {message}")]
    Validation { message: String },

    #[error("State mismatch: expected {expected}, observed {observed} ({detail})")]
    StateMismatch {
        expected: PageState,
        observed: PageState,
        detail: String,
    },

    #[error("Ambiguous outcome: {0}")]
    AmbiguousOutcome(String),

    #[error("Conflicting outcome: {0}")]
    ConflictingOutcome(String),

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Unexpected outcome: expected {expected}, got {actual}")]
    UnexpectedOutcome { expected: String, actual: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Scenario timed out after {0} ms")]
    ScenarioTimeout(u64),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Invalid message pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl FlowError {
    /// Stable classification used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::Validation { .. } => "validation",
            FlowError::StateMismatch { .. } => "state_mismatch",
            FlowError::AmbiguousOutcome(_) => "ambiguous_outcome",
            FlowError::ConflictingOutcome(_) => "conflicting_outcome",
            FlowError::Precondition(_) => "precondition",
            FlowError::UnexpectedOutcome { .. } => "unexpected_outcome",
            FlowError::AssertionFailed(_) => "assertion_failed",
            FlowError::ScenarioTimeout(_) => "scenario_timeout",
            FlowError::Driver(_) => "driver",
            FlowError::InvalidPattern(_) => "invalid_pattern",
            FlowError::InvalidConfig(_) => "invalid_config",
            FlowError::Io(_) => "io",
            FlowError::Toml(_) => "config_parse",
        }
    }

    pub(crate) fn mismatch(
        expected: PageState,
        observed: PageState,
        detail: impl Into<String>,
    ) -> Self {
        FlowError::StateMismatch {
            expected,
            observed,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mismatch_message() {
        let err = FlowError::mismatch(
            PageState::CheckoutStepOne,
            PageState::CheckoutStepTwo,
            "after 'checkout' from cart_page",
        );
        assert_eq!(err.kind(), "state_mismatch");
        assert_eq!(
            err.to_string(),
            "State mismatch: expected checkout_step_one, observed checkout_step_two (after 'checkout' from cart_page)"
        );
    }

    #[test]
    fn test_pattern_error_converts() {
        let err: FlowError = regex::Regex::new("(unclosed").unwrap_err().into();
        assert_eq!(err.kind(), "invalid_pattern");
    }
}
