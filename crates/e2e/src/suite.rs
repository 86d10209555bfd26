//! Declarative YAML case suites
//!
//! A suite is one more scenario matrix: a template plus named input variants
//! with their expected outcomes.
//!
//! ```yaml
//! name: login-extra
//! template: login
//! tags: [auth]
//! cases:
//!   - name: Trailing tab in password
//!     inputs: { username: standard_user, password: "secret_sauce\t" }
//!     expect: { error: do not match any user }
//! ```

use std::path::Path;

use flowprobe_engine::site::Site;
use flowprobe_engine::{
    CaseInputs, ExpectedOutcome, MessageCatalog, PageState, ScenarioCase, ScenarioTemplate,
};
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Login,
    Checkout,
}

impl TemplateKind {
    pub fn template<'a>(&self, site: &'a Site) -> &'a ScenarioTemplate {
        match self {
            TemplateKind::Login => &site.login,
            TemplateKind::Checkout => &site.checkout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// Regex matched against the visible error text
    Error(String),
    Transition(PageState),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteCase {
    pub name: String,
    pub inputs: CaseInputs,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub expect: Expectation,
}

/// A case suite parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSuite {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering suites
    #[serde(default)]
    pub tags: Vec<String>,

    pub template: TemplateKind,

    pub cases: Vec<SuiteCase>,
}

impl CaseSuite {
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let suite: Self = serde_yaml::from_str(yaml)?;
        suite.validate()?;
        Ok(suite)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SuiteParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all suites under a directory, in file name order
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut suites = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            suites.push(Self::from_file(entry.path())?);
        }

        Ok(suites)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Inputs must fit the template: credentials for login, form fields for
    /// checkout.
    fn validate(&self) -> E2eResult<()> {
        if self.cases.is_empty() {
            return Err(E2eError::SuiteParse(format!("suite '{}' has no cases", self.name)));
        }

        for case in &self.cases {
            let fits = matches!(
                (self.template, &case.inputs),
                (TemplateKind::Login, CaseInputs::Credentials(_)) | (TemplateKind::Checkout, CaseInputs::Form(_))
            );
            if !fits {
                return Err(E2eError::SuiteParse(format!(
                    "case '{}' in suite '{}' has inputs that do not fit the {:?} template",
                    case.name, self.name, self.template
                )));
            }
            if let Expectation::Transition(PageState::Unknown) = case.expect {
                return Err(E2eError::SuiteParse(format!(
                    "case '{}' expects a transition to unknown",
                    case.name
                )));
            }
        }
        Ok(())
    }

    /// Build matrix cases, compiling error patterns with the catalog's case
    /// sensitivity
    pub fn to_cases(&self, messages: &MessageCatalog) -> E2eResult<Vec<ScenarioCase>> {
        self.cases
            .iter()
            .map(|case| -> E2eResult<ScenarioCase> {
                let expected = match &case.expect {
                    Expectation::Error(pattern) => ExpectedOutcome::error(messages.pattern(pattern)?),
                    Expectation::Transition(to) => ExpectedOutcome::transition(*to),
                };
                Ok(ScenarioCase::new(case.name.clone(), case.inputs.clone(), expected))
            })
            .collect()
    }
}
