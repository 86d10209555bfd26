//! Classified results of submissions and what scenarios expect of them

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{FlowError, FlowResult};
use crate::state::PageState;

/// What a submission produced, as seen by the outcome probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Error indicator became visible; `message` is its verbatim text
    ErrorShown { message: String },
    /// The awaited state was observed
    Transitioned { to: PageState },
    /// Neither signal before the timeout
    Ambiguous,
    /// Both signals observed
    Conflicting,
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::ErrorShown { .. } => "error_shown",
            Outcome::Transitioned { .. } => "transitioned",
            Outcome::Ambiguous => "ambiguous",
            Outcome::Conflicting => "conflicting",
        }
    }

    /// The error message, or the failure this outcome represents for a
    /// caller that needed an error.
    pub fn into_error_message(self) -> FlowResult<String> {
        match self {
            Outcome::ErrorShown { message } => Ok(message),
            Outcome::Transitioned { to } => Err(FlowError::UnexpectedOutcome {
                expected: "error shown".to_string(),
                actual: format!("transitioned to {}", to),
            }),
            Outcome::Ambiguous => Err(FlowError::AmbiguousOutcome(
                "no error indicator and no transition before timeout".to_string(),
            )),
            Outcome::Conflicting => Err(FlowError::ConflictingOutcome(
                "error indicator shown while navigating away".to_string(),
            )),
        }
    }

    /// The reached state, or the failure this outcome represents for a
    /// caller that needed the site to accept its input.
    pub fn into_transition(self) -> FlowResult<PageState> {
        match self {
            Outcome::Transitioned { to } => Ok(to),
            Outcome::ErrorShown { message } => Err(FlowError::Validation { message }),
            Outcome::Ambiguous => Err(FlowError::AmbiguousOutcome(
                "no transition and no error indicator before timeout".to_string(),
            )),
            Outcome::Conflicting => Err(FlowError::ConflictingOutcome(
                "transitioned while an error indicator was shown".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::ErrorShown { message } => write!(f, "error shown: \"{}\"", message),
            Outcome::Transitioned { to } => write!(f, "transitioned to {}", to),
            Outcome::Ambiguous => write!(f, "ambiguous (nothing happened)"),
            Outcome::Conflicting => write!(f, "conflicting (error and transition)"),
        }
    }
}

/// Pattern applied to visible error text.
///
/// Site wording is not a contract, so matching is a regex search rather
/// than equality, case-insensitive unless configured otherwise.
#[derive(Debug, Clone)]
pub struct MessagePattern {
    source: String,
    regex: Regex,
}

impl MessagePattern {
    pub fn new(pattern: &str, case_sensitive: bool) -> FlowResult<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Pattern matching `text` literally anywhere in the message
    pub fn contains(text: &str, case_sensitive: bool) -> FlowResult<Self> {
        Self::new(&regex::escape(text), case_sensitive)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, message: &str) -> bool {
        self.regex.is_match(message)
    }
}

impl PartialEq for MessagePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.regex.as_str() == other.regex.as_str()
    }
}

impl Serialize for MessagePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl std::fmt::Display for MessagePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/", self.source)
    }
}

/// What a scenario case expects. Ambiguous and conflicting outcomes are
/// never expectable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExpectedOutcome {
    ErrorShown(MessagePattern),
    Transitioned(PageState),
}

impl ExpectedOutcome {
    pub fn error(pattern: MessagePattern) -> Self {
        ExpectedOutcome::ErrorShown(pattern)
    }

    pub fn transition(to: PageState) -> Self {
        ExpectedOutcome::Transitioned(to)
    }

    /// Check an observed outcome against this expectation
    pub fn verify(&self, actual: &Outcome) -> FlowResult<()> {
        match (self, actual) {
            (_, Outcome::Ambiguous) => Err(FlowError::AmbiguousOutcome(format!(
                "expected {}, but neither an error nor a transition appeared",
                self
            ))),
            (_, Outcome::Conflicting) => Err(FlowError::ConflictingOutcome(format!(
                "expected {}, but both an error and a transition appeared",
                self
            ))),
            (ExpectedOutcome::ErrorShown(pattern), Outcome::ErrorShown { message })
                if pattern.is_match(message) =>
            {
                Ok(())
            }
            (ExpectedOutcome::Transitioned(want), Outcome::Transitioned { to }) if want == to => Ok(()),
            _ => Err(FlowError::UnexpectedOutcome {
                expected: self.to_string(),
                actual: actual.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ExpectedOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpectedOutcome::ErrorShown(pattern) => write!(f, "error shown matching {}", pattern),
            ExpectedOutcome::Transitioned(to) => write!(f, "transition to {}", to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shown(message: &str) -> Outcome {
        Outcome::ErrorShown {
            message: message.to_string(),
        }
    }

    #[test]
    fn test_pattern_is_case_insensitive_by_default() {
        let pattern = MessagePattern::new("username is required", false).unwrap();
        assert!(pattern.is_match("Epic sadface: Username is required"));

        let strict = MessagePattern::new("username is required", true).unwrap();
        assert!(!strict.is_match("Epic sadface: Username is required"));
    }

    #[test]
    fn test_contains_escapes_regex_metacharacters() {
        let pattern = MessagePattern::contains("(required)", false).unwrap();
        assert!(pattern.is_match("Field (REQUIRED)"));
        assert!(!pattern.is_match("Field required"));
    }

    #[test]
    fn test_verify_error_pattern() {
        let expected = ExpectedOutcome::error(MessagePattern::new("locked out", false).unwrap());
        assert!(expected
            .verify(&shown("Epic sadface: Sorry, this user has been locked out."))
            .is_ok());

        let err = expected
            .verify(&shown("Epic sadface: Password is required"))
            .unwrap_err();
        assert_eq!(err.kind(), "unexpected_outcome");
    }

    #[test]
    fn test_verify_transition_target() {
        let expected = ExpectedOutcome::transition(PageState::CheckoutStepTwo);
        assert!(expected
            .verify(&Outcome::Transitioned { to: PageState::CheckoutStepTwo })
            .is_ok());
        assert!(expected.verify(&shown("Error: First Name is required")).is_err());
    }

    #[test]
    fn test_ambiguous_and_conflicting_never_pass() {
        let expectations = [
            ExpectedOutcome::transition(PageState::CheckoutStepTwo),
            ExpectedOutcome::error(MessagePattern::new(".*", false).unwrap()),
        ];
        for expected in &expectations {
            assert_eq!(expected.verify(&Outcome::Ambiguous).unwrap_err().kind(), "ambiguous_outcome");
            assert_eq!(
                expected.verify(&Outcome::Conflicting).unwrap_err().kind(),
                "conflicting_outcome"
            );
        }
    }

    #[test]
    fn test_into_transition_surfaces_validation() {
        let err = shown("Error: Postal Code is required").into_transition().unwrap_err();
        assert!(matches!(err, FlowError::Validation { ref message } if message.contains("Postal Code")));
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(Outcome::Transitioned { to: PageState::CartPage }).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "transitioned", "to": "cart_page" }));
    }
}
