//! Named scenarios and case catalogs for the purchase flow

use std::time::Instant;

use tracing::info;

use crate::config::FlowConfig;
use crate::error::{FlowError, FlowResult};
use crate::lifecycle::ErrorLifecycleTracker;
use crate::matrix::{
    finish_case, CaseInputs, CaseReport, Credentials, FormFields, MatrixReport, ScenarioCase, ScenarioMatrix,
    ScenarioTemplate,
};
use crate::navigator::Navigator;
use crate::outcome::{ExpectedOutcome, Outcome};
use crate::probe::OutcomeProbe;
use crate::reconciler::FlowReconciler;
use crate::session::{ElementRef, Selector, SessionHandle, SharedSession};
use crate::site::{elements, Site, COMPLETION_TEXT};
use crate::state::PageState;
use crate::wait::poll_until;

pub const LOGIN_NEGATIVE: &str = "login-negative";
pub const CHECKOUT_NEGATIVE: &str = "checkout-negative";
pub const CHECKOUT_POSITIVE: &str = "checkout-positive";
pub const ERROR_LIFECYCLE: &str = "error-lifecycle";
pub const NAVIGATION: &str = "navigation";

pub const SUITES: [&str; 5] = [
    LOGIN_NEGATIVE,
    CHECKOUT_NEGATIVE,
    CHECKOUT_POSITIVE,
    ERROR_LIFECYCLE,
    NAVIGATION,
];

pub const LOCKED_OUT_USER: &str = "locked_out_user";

/// Login cases for required fields and the locked-out account
pub fn login_required_cases(config: &FlowConfig) -> FlowResult<Vec<ScenarioCase>> {
    let m = &config.messages;
    let valid = &config.credentials;

    Ok(vec![
        ScenarioCase::new(
            "Username empty (click Login)",
            Credentials::new("", ""),
            ExpectedOutcome::error(m.pattern(&m.username_required)?),
        ),
        ScenarioCase::new(
            "Password empty with valid username",
            Credentials::new(valid.username.as_str(), ""),
            ExpectedOutcome::error(m.pattern(&m.password_required)?),
        ),
        ScenarioCase::new(
            "Locked out user cannot login",
            Credentials::new(LOCKED_OUT_USER, valid.password.as_str()),
            ExpectedOutcome::error(m.pattern(&m.locked_out)?),
        ),
    ])
}

/// Credential variants that must all be rejected as unknown users
pub fn invalid_credentials_cases(config: &FlowConfig) -> FlowResult<Vec<ScenarioCase>> {
    let user = config.credentials.username.as_str();
    let pass = config.credentials.password.as_str();
    let long = "a".repeat(300);

    let variants: Vec<(&str, String, String)> = vec![
        ("Wrong password for valid user", user.into(), "wrong_password".into()),
        ("Wrong username with valid password", "wrong_user".into(), pass.into()),
        ("Wrong username and wrong password", "wrong_user".into(), "wrong_password".into()),
        ("Password is only spaces", user.into(), "   ".into()),
        ("Username has leading/trailing spaces", format!("  {}  ", user), pass.into()),
        ("Password has leading/trailing spaces", user.into(), format!("  {}  ", pass)),
        ("Username includes tab characters", "standard\t_user".into(), pass.into()),
        ("Username in different case", user.to_uppercase(), pass.into()),
        ("Very long username", long.clone(), pass.into()),
        ("Very long password", user.into(), long),
        ("Username with special characters", "!@#$%^&*()_+{}:\"<>?".into(), pass.into()),
        ("SQL-like string as username", "' OR 1=1 --".into(), pass.into()),
        ("XSS-like string as username", "<script>alert(1)</script>".into(), pass.into()),
        ("Username is only spaces", "   ".into(), pass.into()),
    ];

    let m = &config.messages;
    variants
        .into_iter()
        .map(|(name, u, p)| -> FlowResult<ScenarioCase> {
            Ok(ScenarioCase::new(
                name,
                Credentials::new(u, p),
                ExpectedOutcome::error(m.pattern(&m.invalid_credentials)?),
            ))
        })
        .collect()
}

/// Checkout step one validations. Each required-field case leaves exactly
/// one field empty.
pub fn checkout_field_cases(config: &FlowConfig) -> FlowResult<Vec<ScenarioCase>> {
    let m = &config.messages;
    Ok(vec![
        ScenarioCase::new(
            "All fields empty -> First Name is required",
            FormFields::new("", "", ""),
            ExpectedOutcome::error(m.pattern(&m.first_name_required)?),
        ),
        ScenarioCase::new(
            "First Name empty -> First Name is required",
            FormFields::new("", "User", "12345"),
            ExpectedOutcome::error(m.pattern(&m.first_name_required)?),
        ),
        ScenarioCase::new(
            "Last Name empty -> Last Name is required",
            FormFields::new("Test", "", "12345"),
            ExpectedOutcome::error(m.pattern(&m.last_name_required)?),
        ),
        ScenarioCase::new(
            "Postal Code empty -> Postal Code is required",
            FormFields::new("Test", "User", ""),
            ExpectedOutcome::error(m.pattern(&m.postal_code_required)?),
        ),
        ScenarioCase::new(
            "Fields with only spaces are accepted",
            FormFields::new("   ", "   ", "   "),
            ExpectedOutcome::transition(PageState::CheckoutStepTwo),
        ),
    ])
}

/// Named entry points over one session
pub struct Scenarios {
    config: FlowConfig,
    site: Site,
    navigator: Navigator,
    reconciler: FlowReconciler,
    probe: OutcomeProbe,
    matrix: ScenarioMatrix,
}

impl Scenarios {
    pub fn new(session: SharedSession, config: FlowConfig) -> FlowResult<Self> {
        config.validate()?;
        let site = Site::saucedemo(&config)?;
        let t = &config.timeouts;

        let navigator = Navigator::new(session, site.signatures.clone(), t.poll());
        let probe = OutcomeProbe::new(navigator.clone(), t.settle());
        let reconciler = FlowReconciler::new(navigator.clone(), site.recovery.clone(), t.step());
        let matrix = ScenarioMatrix::new(
            FlowReconciler::new(navigator.clone(), site.recovery.clone(), t.step()),
            probe.clone(),
            t.outcome(),
            t.scenario(),
        );

        Ok(Self {
            config,
            site,
            navigator,
            reconciler,
            probe,
            matrix,
        })
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn reconciler(&self) -> &FlowReconciler {
        &self.reconciler
    }

    pub fn probe(&self) -> &OutcomeProbe {
        &self.probe
    }

    pub fn matrix(&self) -> &ScenarioMatrix {
        &self.matrix
    }

    fn session(&self) -> &dyn SessionHandle {
        self.navigator.session()
    }

    pub async fn run_matrix(&self, cases: &[ScenarioCase], template: &ScenarioTemplate) -> MatrixReport {
        self.matrix.run(cases, template).await
    }

    pub async fn login_negative(&self) -> FlowResult<MatrixReport> {
        let mut cases = login_required_cases(&self.config)?;
        cases.extend(invalid_credentials_cases(&self.config)?);
        let mut report = self.run_matrix(&cases, &self.site.login).await;
        report.name = LOGIN_NEGATIVE.to_string();
        Ok(report)
    }

    pub async fn checkout_negative(&self) -> FlowResult<MatrixReport> {
        let cases = checkout_field_cases(&self.config)?;
        let mut report = self.run_matrix(&cases, &self.site.checkout).await;
        report.name = CHECKOUT_NEGATIVE.to_string();
        Ok(report)
    }

    /// Log in, buy the first item and check the order confirmation
    pub async fn successful_checkout(&self) -> CaseReport {
        let started = Instant::now();
        let mut actual = None;
        let result = self.timed(self.checkout_end_to_end(&mut actual)).await;
        self.finish(
            "Successful checkout flow",
            CHECKOUT_POSITIVE,
            format!("transition to {} with completion message", PageState::CheckoutComplete),
            actual,
            result,
            started,
        )
        .await
    }

    async fn checkout_end_to_end(&self, actual: &mut Option<Outcome>) -> FlowResult<()> {
        let t = &self.config.timeouts;
        let session = self.session();

        self.reconciler.reconcile(PageState::InventoryPage).await?;
        session.click(&elements::add_to_cart_first()).await?;
        self.reconciler.traverse(PageState::InventoryPage, "open_cart").await?;
        self.expect_visible(&elements::cart_item(), "cart shows the added item").await?;
        self.reconciler.traverse(PageState::CartPage, "checkout").await?;

        let customer = CaseInputs::from(self.config.customer.form_fields());
        for (field, value) in customer.values() {
            if let Some(value) = value {
                session.fill(self.site.checkout.binding(field)?, value).await?;
            }
        }
        session.click(&elements::continue_button()).await?;
        self.probe
            .expect_outcome(&elements::error_message(), PageState::CheckoutStepTwo, t.outcome())
            .await?
            .into_transition()?;

        session.click(&elements::finish_button()).await?;
        let outcome = self
            .probe
            .expect_outcome(&elements::error_message(), PageState::CheckoutComplete, t.outcome())
            .await?;
        *actual = Some(outcome.clone());
        ExpectedOutcome::transition(PageState::CheckoutComplete).verify(&outcome)?;

        let completion = session.locate(Selector::text(COMPLETION_TEXT));
        self.expect_visible(&completion, "completion acknowledgment").await
    }

    pub async fn cancel_from_step_one_returns_to_cart(&self) -> CaseReport {
        self.cancel_from(PageState::CheckoutStepOne, PageState::CartPage, "Cancel returns to cart")
            .await
    }

    pub async fn cancel_from_step_two_returns_to_inventory(&self) -> CaseReport {
        self.cancel_from(
            PageState::CheckoutStepTwo,
            PageState::InventoryPage,
            "Cancel from overview returns to inventory",
        )
        .await
    }

    async fn cancel_from(&self, from: PageState, expected: PageState, name: &str) -> CaseReport {
        let started = Instant::now();
        let mut actual = None;
        let result = self
            .timed(async {
                self.reconciler.reconcile(from).await?;
                let landed = self.reconciler.traverse(from, "cancel").await?;
                actual = Some(Outcome::Transitioned { to: landed });
                Ok::<(), FlowError>(())
            })
            .await;
        self.finish(name, NAVIGATION, format!("transition to {}", expected), actual, result, started)
            .await
    }

    /// Wrong password, dismiss the error, retry: the same error comes back
    pub async fn login_error_dismiss_and_reappear(&self) -> CaseReport {
        let started = Instant::now();
        let mut actual = None;
        let result = self
            .timed(async {
                let m = &self.config.messages;
                let pattern = m.pattern(&m.invalid_credentials)?;
                let template = &self.site.login;

                self.reconciler.reconcile(template.start).await?;
                self.clear_error(template).await?;
                let session = self.session();
                session
                    .fill(&elements::username_input(), &self.config.credentials.username)
                    .await?;
                session.fill(&elements::password_input(), "wrong_password").await?;
                session.click(&template.submit).await?;

                self.dismiss_and_retry(template, &ExpectedOutcome::error(pattern), &mut actual)
                    .await
            })
            .await;
        self.finish(
            "Login error can be dismissed and appears again",
            ERROR_LIFECYCLE,
            "error dismissed, then shown again unchanged".to_string(),
            actual,
            result,
            started,
        )
        .await
    }

    /// Empty checkout form, dismiss the error, retry: the same error comes back
    pub async fn checkout_error_dismiss_and_reappear(&self) -> CaseReport {
        let started = Instant::now();
        let mut actual = None;
        let result = self
            .timed(async {
                let m = &self.config.messages;
                let pattern = m.pattern(&m.first_name_required)?;
                let template = &self.site.checkout;

                self.reconciler.reconcile(template.start).await?;
                self.clear_error(template).await?;
                let session = self.session();
                for field in [
                    elements::first_name_input(),
                    elements::last_name_input(),
                    elements::postal_code_input(),
                ] {
                    session.fill(&field, "").await?;
                }
                session.click(&template.submit).await?;

                self.dismiss_and_retry(template, &ExpectedOutcome::error(pattern), &mut actual)
                    .await
            })
            .await;
        self.finish(
            "Checkout error can be closed and appears again",
            ERROR_LIFECYCLE,
            "error dismissed, then shown again unchanged".to_string(),
            actual,
            result,
            started,
        )
        .await
    }

    async fn dismiss_and_retry(
        &self,
        template: &ScenarioTemplate,
        expected: &ExpectedOutcome,
        actual: &mut Option<Outcome>,
    ) -> FlowResult<()> {
        let timeout = self.config.timeouts.outcome();
        let first = self
            .probe
            .expect_outcome(&template.error_indicator, template.success_state, timeout)
            .await?;
        *actual = Some(first.clone());
        expected.verify(&first)?;

        let mut tracker = self.tracker(template)?;
        tracker.dismiss().await?;

        let submit = template.submit.clone();
        let unchanged = tracker
            .reappears_on_retry(|| async move { self.session().click(&submit).await })
            .await?;

        let again = Outcome::ErrorShown {
            message: tracker.lifecycle().message.clone().unwrap_or_default(),
        };
        *actual = Some(again.clone());
        expected.verify(&again)?;

        if !unchanged {
            return Err(FlowError::AssertionFailed(format!(
                "error changed after retry: \"{}\" became \"{}\"",
                tracker.dismissed_message().unwrap_or_default(),
                tracker.lifecycle().message.as_deref().unwrap_or_default()
            )));
        }
        Ok(())
    }

    fn tracker(&self, template: &ScenarioTemplate) -> FlowResult<ErrorLifecycleTracker> {
        let dismiss = template.dismiss_control.clone().ok_or_else(|| {
            FlowError::Precondition(format!("template '{}' has no dismiss control", template.name))
        })?;
        Ok(ErrorLifecycleTracker::new(
            self.probe.clone(),
            template.error_indicator.clone(),
            dismiss,
            template.success_state,
            self.config.timeouts.outcome(),
        ))
    }

    async fn clear_error(&self, template: &ScenarioTemplate) -> FlowResult<()> {
        if self.session().is_visible(&template.error_indicator).await? {
            self.tracker(template)?.dismiss().await?;
        }
        Ok(())
    }

    async fn expect_visible(&self, element: &ElementRef, what: &str) -> FlowResult<()> {
        let timeout = self.config.timeouts.outcome();
        let poll = self.config.timeouts.poll();
        let session = self.navigator.shared_session();
        let target = element.clone();
        let visible = poll_until(timeout, poll, || {
            let session = session.clone();
            let target = target.clone();
            async move { session.is_visible(&target).await }
        })
        .await?;

        if visible {
            Ok(())
        } else {
            Err(FlowError::AssertionFailed(format!("{} not visible ({})", what, element)))
        }
    }

    async fn timed<F>(&self, scenario: F) -> FlowResult<()>
    where
        F: std::future::Future<Output = FlowResult<()>>,
    {
        let limit = self.config.timeouts.scenario();
        match tokio::time::timeout(limit, scenario).await {
            Ok(result) => result,
            Err(_) => Err(FlowError::ScenarioTimeout(limit.as_millis() as u64)),
        }
    }

    async fn finish(
        &self,
        name: &str,
        suite: &str,
        expected: String,
        actual: Option<Outcome>,
        result: FlowResult<()>,
        started: Instant,
    ) -> CaseReport {
        finish_case(
            &self.navigator,
            &elements::error_message(),
            name,
            suite,
            expected,
            actual,
            result,
            started,
        )
        .await
    }

    /// Run one named suite
    pub async fn run_suite(&self, suite: &str) -> FlowResult<MatrixReport> {
        let started = Instant::now();
        let mut report = match suite {
            LOGIN_NEGATIVE => return self.login_negative().await,
            CHECKOUT_NEGATIVE => return self.checkout_negative().await,
            CHECKOUT_POSITIVE => {
                let mut report = MatrixReport::new(suite);
                report.push(self.successful_checkout().await);
                report
            }
            ERROR_LIFECYCLE => {
                let mut report = MatrixReport::new(suite);
                report.push(self.login_error_dismiss_and_reappear().await);
                report.push(self.checkout_error_dismiss_and_reappear().await);
                report
            }
            NAVIGATION => {
                let mut report = MatrixReport::new(suite);
                report.push(self.cancel_from_step_one_returns_to_cart().await);
                report.push(self.cancel_from_step_two_returns_to_inventory().await);
                report
            }
            other => {
                return Err(FlowError::InvalidConfig(format!(
                    "unknown suite '{}' (known: {})",
                    other,
                    SUITES.join(", ")
                )))
            }
        };
        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Every built-in suite, in a fixed order
    pub async fn run_all(&self) -> FlowResult<Vec<MatrixReport>> {
        let mut reports = Vec::with_capacity(SUITES.len());
        for suite in SUITES {
            info!("Suite '{}'", suite);
            reports.push(self.run_suite(suite).await?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::CaseInputs;

    #[test]
    fn test_invalid_credentials_catalog() {
        let config = FlowConfig::default();
        let cases = invalid_credentials_cases(&config).unwrap();
        assert_eq!(cases.len(), 14);

        for case in &cases {
            let CaseInputs::Credentials(c) = &case.inputs else {
                panic!("{} is not a credentials case", case.name);
            };
            assert_ne!(
                (c.username.as_str(), c.password.as_str()),
                ("standard_user", "secret_sauce"),
                "{} would log in",
                case.name
            );
        }
        assert!(cases.iter().any(|c| c.name == "Very long username"));
    }

    #[test]
    fn test_required_field_cases_leave_one_field_empty() {
        let cases = checkout_field_cases(&FlowConfig::default()).unwrap();
        for case in cases.iter().skip(1).take(3) {
            let CaseInputs::Form(f) = &case.inputs else {
                panic!("{} is not a form case", case.name);
            };
            let empty = [&f.first_name, &f.last_name, &f.postal_code]
                .iter()
                .filter(|v| v.as_deref() == Some(""))
                .count();
            assert_eq!(empty, 1, "{}", case.name);
        }
    }

    #[test]
    fn test_catalog_follows_configured_wording() {
        let mut config = FlowConfig::default();
        config.messages.locked_out = "account suspended".to_string();
        let cases = login_required_cases(&config).unwrap();
        assert_eq!(
            cases[2].expected.to_string(),
            "error shown matching /account suspended/"
        );
    }
}
