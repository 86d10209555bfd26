//! Data-driven scenario matrix
//!
//! A template fixes where a scenario starts, which fields it fills and what
//! it submits. Cases vary only the inputs and the expected outcome. Every
//! case runs independently: it reconciles its own starting state, and a
//! failure is recorded rather than propagated.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{FlowError, FlowResult};
use crate::lifecycle::ErrorLifecycleTracker;
use crate::navigator::Navigator;
use crate::outcome::{ExpectedOutcome, Outcome};
use crate::probe::OutcomeProbe;
use crate::reconciler::FlowReconciler;
use crate::session::ElementRef;
use crate::state::PageState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Checkout form values. `None` means the case types nothing into the
/// field, so it is submitted empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormFields {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl FormFields {
    pub fn new(first_name: &str, last_name: &str, postal_code: &str) -> Self {
        Self {
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            postal_code: Some(postal_code.to_string()),
        }
    }
}

/// Field a template knows how to fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputField {
    Username,
    Password,
    FirstName,
    LastName,
    PostalCode,
}

impl std::fmt::Display for InputField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InputField::Username => "username",
            InputField::Password => "password",
            InputField::FirstName => "first_name",
            InputField::LastName => "last_name",
            InputField::PostalCode => "postal_code",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaseInputs {
    Credentials(Credentials),
    Form(FormFields),
}

impl CaseInputs {
    /// Values in fill order; `None` means not provided
    pub fn values(&self) -> Vec<(InputField, Option<&str>)> {
        match self {
            CaseInputs::Credentials(c) => vec![
                (InputField::Username, Some(c.username.as_str())),
                (InputField::Password, Some(c.password.as_str())),
            ],
            CaseInputs::Form(f) => vec![
                (InputField::FirstName, f.first_name.as_deref()),
                (InputField::LastName, f.last_name.as_deref()),
                (InputField::PostalCode, f.postal_code.as_deref()),
            ],
        }
    }
}

impl From<Credentials> for CaseInputs {
    fn from(c: Credentials) -> Self {
        CaseInputs::Credentials(c)
    }
}

impl From<FormFields> for CaseInputs {
    fn from(f: FormFields) -> Self {
        CaseInputs::Form(f)
    }
}

/// One named input variant and its expected outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioCase {
    pub name: String,
    pub inputs: CaseInputs,
    pub expected: ExpectedOutcome,
}

impl ScenarioCase {
    pub fn new(name: impl Into<String>, inputs: impl Into<CaseInputs>, expected: ExpectedOutcome) -> Self {
        Self {
            name: name.into(),
            inputs: inputs.into(),
            expected,
        }
    }
}

/// The fixed part of a family of cases
#[derive(Debug, Clone)]
pub struct ScenarioTemplate {
    pub name: String,
    pub start: PageState,
    pub fields: Vec<(InputField, ElementRef)>,
    pub submit: ElementRef,
    pub error_indicator: ElementRef,
    /// Used to clear an error left over from the previous case
    pub dismiss_control: Option<ElementRef>,
    /// Where an accepted submission lands
    pub success_state: PageState,
}

impl ScenarioTemplate {
    pub fn binding(&self, field: InputField) -> FlowResult<&ElementRef> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, el)| el)
            .ok_or_else(|| {
                FlowError::Precondition(format!("template '{}' has no binding for {}", self.name, field))
            })
    }
}

/// Pass/fail of one case with enough context to triage without re-running
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub template: String,
    pub passed: bool,
    pub expected: String,
    pub actual: Option<Outcome>,
    pub last_state: PageState,
    pub error_text: Option<String>,
    pub failure_kind: Option<String>,
    pub failure: Option<String>,
    pub duration_ms: u64,
}

impl CaseReport {
    pub fn diagnostic(&self) -> String {
        let actual = self
            .actual
            .as_ref()
            .map(|o| o.to_string())
            .unwrap_or_else(|| "no outcome".to_string());
        let mut line = format!(
            "expected {}; got {}; last page {}",
            self.expected, actual, self.last_state
        );
        if let Some(text) = &self.error_text {
            line.push_str(&format!("; error text \"{}\"", text));
        }
        if let Some(failure) = &self.failure {
            line.push_str(&format!("; {}", failure));
        }
        line
    }
}

/// Results of one matrix or suite run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatrixReport {
    pub name: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseReport>,
}

impl MatrixReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, report: CaseReport) {
        self.total += 1;
        if report.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(report);
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Last observed state and raw error text, read best-effort after a case
pub async fn diagnose(navigator: &Navigator, error_indicator: &ElementRef) -> (PageState, Option<String>) {
    let last_state = navigator.observe().await.unwrap_or(PageState::Unknown);
    let session = navigator.session();
    let error_text = match session.is_visible(error_indicator).await {
        Ok(true) => session.text_content(error_indicator).await.ok(),
        _ => None,
    };
    (last_state, error_text)
}

/// Record a finished case, logging it the same way for matrices and named
/// scenarios
#[allow(clippy::too_many_arguments)]
pub async fn finish_case(
    navigator: &Navigator,
    error_indicator: &ElementRef,
    name: &str,
    template: &str,
    expected: String,
    actual: Option<Outcome>,
    result: FlowResult<()>,
    started: Instant,
) -> CaseReport {
    let (last_state, error_text) = diagnose(navigator, error_indicator).await;
    let (failure_kind, failure) = match &result {
        Ok(()) => (None, None),
        Err(e) => (Some(e.kind().to_string()), Some(e.to_string())),
    };

    let report = CaseReport {
        name: name.to_string(),
        template: template.to_string(),
        passed: result.is_ok(),
        expected,
        actual,
        last_state,
        error_text,
        failure_kind,
        failure,
        duration_ms: started.elapsed().as_millis() as u64,
    };

    if report.passed {
        info!("✓ {} ({} ms)", report.name, report.duration_ms);
    } else {
        error!("✗ {} - {}", report.name, report.diagnostic());
    }
    report
}

pub struct ScenarioMatrix {
    reconciler: FlowReconciler,
    probe: OutcomeProbe,
    outcome_timeout: Duration,
    scenario_timeout: Duration,
}

impl ScenarioMatrix {
    pub fn new(
        reconciler: FlowReconciler,
        probe: OutcomeProbe,
        outcome_timeout: Duration,
        scenario_timeout: Duration,
    ) -> Self {
        Self {
            reconciler,
            probe,
            outcome_timeout,
            scenario_timeout,
        }
    }

    fn navigator(&self) -> &Navigator {
        self.reconciler.navigator()
    }

    /// Run every case in insertion order and collect all results
    pub async fn run(&self, cases: &[ScenarioCase], template: &ScenarioTemplate) -> MatrixReport {
        let started = Instant::now();
        let mut report = MatrixReport::new(template.name.clone());

        info!("Running {} case(s) of '{}'...", cases.len(), template.name);

        for case in cases {
            report.push(self.run_one(case, template).await);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "'{}': {} passed, {} failed ({} ms)",
            template.name, report.passed, report.failed, report.duration_ms
        );
        report
    }

    /// Run a single case under the scenario timeout
    pub async fn run_one(&self, case: &ScenarioCase, template: &ScenarioTemplate) -> CaseReport {
        let started = Instant::now();
        let mut actual = None;

        let result = match tokio::time::timeout(self.scenario_timeout, self.run_case(case, template, &mut actual)).await {
            Ok(result) => result,
            Err(_) => Err(FlowError::ScenarioTimeout(self.scenario_timeout.as_millis() as u64)),
        };

        finish_case(
            self.navigator(),
            &template.error_indicator,
            &case.name,
            &template.name,
            case.expected.to_string(),
            actual,
            result,
            started,
        )
        .await
    }

    async fn run_case(
        &self,
        case: &ScenarioCase,
        template: &ScenarioTemplate,
        actual: &mut Option<Outcome>,
    ) -> FlowResult<()> {
        debug!("Case '{}': reconciling to {}", case.name, template.start);
        self.reconciler.reconcile(template.start).await?;
        self.clear_stale_error(template).await?;

        let session = self.navigator().session();
        let values = case.inputs.values();
        for (field, _) in &values {
            template.binding(*field)?;
        }
        // Every bound field is written so nothing typed by an earlier case
        // survives into this one.
        for (field, element) in &template.fields {
            let value = values
                .iter()
                .find(|(f, _)| f == field)
                .and_then(|(_, v)| *v)
                .unwrap_or("");
            session.fill(element, value).await?;
        }
        session.click(&template.submit).await?;

        let outcome = self
            .probe
            .expect_outcome(&template.error_indicator, template.success_state, self.outcome_timeout)
            .await?;
        *actual = Some(outcome.clone());
        case.expected.verify(&outcome)?;

        if let Outcome::ErrorShown { .. } = outcome {
            let state = self.navigator().observe().await?;
            if state != template.start {
                return Err(FlowError::mismatch(
                    template.start,
                    state,
                    "error shown but the page changed",
                ));
            }
        }
        Ok(())
    }

    /// An error left by the previous case would be read as this case's
    /// outcome, so it has to go first.
    async fn clear_stale_error(&self, template: &ScenarioTemplate) -> FlowResult<()> {
        let session = self.navigator().session();
        if !session.is_visible(&template.error_indicator).await? {
            return Ok(());
        }

        let dismiss = template.dismiss_control.clone().ok_or_else(|| {
            FlowError::Precondition(format!(
                "stale error visible on {} and template '{}' has no dismiss control",
                template.start, template.name
            ))
        })?;

        debug!("Clearing stale error before next case");
        let mut tracker = ErrorLifecycleTracker::new(
            self.probe.clone(),
            template.error_indicator.clone(),
            dismiss,
            template.success_state,
            self.outcome_timeout,
        );
        tracker.dismiss().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_values_keep_field_order_and_gaps() {
        let inputs = CaseInputs::from(FormFields {
            first_name: None,
            last_name: Some("User".into()),
            postal_code: Some(String::new()),
        });
        assert_eq!(
            inputs.values(),
            vec![
                (InputField::FirstName, None),
                (InputField::LastName, Some("User")),
                (InputField::PostalCode, Some("")),
            ]
        );
    }

    #[test]
    fn test_untagged_inputs_pick_the_right_shape() {
        let creds: CaseInputs = serde_json::from_str(r#"{"username":"u","password":""}"#).unwrap();
        assert!(matches!(creds, CaseInputs::Credentials(_)));

        let form: CaseInputs = serde_json::from_str(r#"{"last_name":"User"}"#).unwrap();
        assert_eq!(
            form,
            CaseInputs::Form(FormFields {
                last_name: Some("User".into()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_matrix_report_totals() {
        let case = |passed| CaseReport {
            name: "c".into(),
            template: "t".into(),
            passed,
            expected: "x".into(),
            actual: None,
            last_state: PageState::LoginPage,
            error_text: None,
            failure_kind: None,
            failure: None,
            duration_ms: 1,
        };
        let mut report = MatrixReport::new("t");
        report.push(case(true));
        report.push(case(false));
        report.push(case(true));
        assert_eq!((report.total, report.passed, report.failed), (3, 2, 1));
        assert!(!report.all_passed());
    }

    #[test]
    fn test_diagnostic_includes_state_and_text() {
        let report = CaseReport {
            name: "Wrong password".into(),
            template: "login".into(),
            passed: false,
            expected: "error shown matching /do not match/".into(),
            actual: Some(Outcome::Ambiguous),
            last_state: PageState::LoginPage,
            error_text: Some("Epic sadface".into()),
            failure_kind: Some("ambiguous_outcome".into()),
            failure: Some("Ambiguous outcome: nothing".into()),
            duration_ms: 5,
        };
        let line = report.diagnostic();
        assert!(line.contains("last page login_page"));
        assert!(line.contains("error text \"Epic sadface\""));
        assert!(line.contains("ambiguous"));
    }
}
