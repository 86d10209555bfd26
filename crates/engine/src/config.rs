//! Flow configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, FlowResult};
use crate::matrix::{Credentials, FormFields};
use crate::outcome::MessagePattern;

/// Everything the scenarios need to know about the target shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Login page URL; other pages are resolved relative to it
    pub base_url: String,

    /// Account used to get past the login page
    pub credentials: Credentials,

    /// Customer details for a checkout that should be accepted
    pub customer: CustomerConfig,

    pub timeouts: TimeoutConfig,

    pub messages: MessageCatalog,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.saucedemo.com/".to_string(),
            credentials: Credentials::new("standard_user", "secret_sauce"),
            customer: CustomerConfig::default(),
            timeouts: TimeoutConfig::default(),
            messages: MessageCatalog::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerConfig {
    pub first_name: String,
    pub last_name: String,
    pub postal_code: String,
}

impl Default for CustomerConfig {
    fn default() -> Self {
        Self {
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            postal_code: "12345".to_string(),
        }
    }
}

impl CustomerConfig {
    pub fn form_fields(&self) -> FormFields {
        FormFields::new(&self.first_name, &self.last_name, &self.postal_code)
    }
}

/// Timeouts and intervals, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Wait for each recovery edge to land
    pub step_ms: u64,
    /// Wait for a submission to show an error or transition
    pub outcome_ms: u64,
    /// Polling interval for every wait
    pub poll_ms: u64,
    /// Extra watch window after the first outcome signal
    pub settle_ms: u64,
    /// Hard cap on one scenario case
    pub scenario_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            step_ms: 10_000,
            outcome_ms: 5_000,
            poll_ms: 100,
            settle_ms: 300,
            scenario_ms: 60_000,
        }
    }
}

impl TimeoutConfig {
    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    pub fn outcome(&self) -> Duration {
        Duration::from_millis(self.outcome_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn scenario(&self) -> Duration {
        Duration::from_millis(self.scenario_ms)
    }
}

/// Expected error wordings, as regex patterns.
///
/// The shop's wording is not contractual, so these are configurable rather
/// than baked into the scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageCatalog {
    pub case_sensitive: bool,
    pub username_required: String,
    pub password_required: String,
    pub locked_out: String,
    pub invalid_credentials: String,
    pub first_name_required: String,
    pub last_name_required: String,
    pub postal_code_required: String,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            username_required: "username is required".to_string(),
            password_required: "password is required".to_string(),
            locked_out: "locked out".to_string(),
            invalid_credentials: "do not match any user".to_string(),
            first_name_required: "first name is required".to_string(),
            last_name_required: "last name is required".to_string(),
            postal_code_required: "postal code is required".to_string(),
        }
    }
}

impl MessageCatalog {
    pub fn pattern(&self, pattern: &str) -> FlowResult<MessagePattern> {
        MessagePattern::new(pattern, self.case_sensitive)
    }

    fn all(&self) -> [(&'static str, &str); 7] {
        [
            ("username_required", &self.username_required),
            ("password_required", &self.password_required),
            ("locked_out", &self.locked_out),
            ("invalid_credentials", &self.invalid_credentials),
            ("first_name_required", &self.first_name_required),
            ("last_name_required", &self.last_name_required),
            ("postal_code_required", &self.postal_code_required),
        ]
    }
}

impl FlowConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> FlowResult<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> FlowResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FlowResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(FlowError::InvalidConfig(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }

        let t = &self.timeouts;
        for (name, value) in [
            ("step_ms", t.step_ms),
            ("outcome_ms", t.outcome_ms),
            ("poll_ms", t.poll_ms),
            ("scenario_ms", t.scenario_ms),
        ] {
            if value == 0 {
                return Err(FlowError::InvalidConfig(format!("timeouts.{} must be non-zero", name)));
            }
        }
        if t.poll_ms > t.outcome_ms {
            return Err(FlowError::InvalidConfig(
                "timeouts.poll_ms must not exceed timeouts.outcome_ms".to_string(),
            ));
        }

        for (name, pattern) in self.messages.all() {
            self.messages.pattern(pattern).map_err(|e| {
                FlowError::InvalidConfig(format!("messages.{}: {}", name, e))
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = FlowConfig::from_toml(
            r#"
base_url = "http://127.0.0.1:3000/"

[timeouts]
outcome_ms = 1500

[messages]
locked_out = "has been locked"
"#,
        )
        .unwrap();

        assert_eq!(config.base_url, "http://127.0.0.1:3000/");
        assert_eq!(config.timeouts.outcome(), Duration::from_millis(1500));
        assert_eq!(config.timeouts.poll_ms, 100);
        assert_eq!(config.messages.locked_out, "has been locked");
        assert_eq!(config.messages.invalid_credentials, "do not match any user");
        assert_eq!(config.credentials.username, "standard_user");
    }

    #[test]
    fn test_rejects_bad_pattern() {
        let err = FlowConfig::from_toml("[messages]\nlocked_out = \"(locked\"\n").unwrap_err();
        assert!(err.to_string().contains("messages.locked_out"));
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let err = FlowConfig::from_toml("[timeouts]\npoll_ms = 0\n").unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = FlowConfig::load(Path::new("/nonexistent/flowprobe.toml")).unwrap();
        assert_eq!(config, FlowConfig::default());
    }
}
