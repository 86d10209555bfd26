//! Outcome probe
//!
//! After a submission the site may show an inline error, navigate to the
//! next step, or do nothing. The probe samples both signals on a fixed
//! interval and classifies what happened.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::FlowResult;
use crate::navigator::Navigator;
use crate::outcome::Outcome;
use crate::session::ElementRef;
use crate::state::PageState;

/// One sample of both signals
#[derive(Debug, Clone, Default)]
struct Signals {
    error: Option<String>,
    transitioned: bool,
}

impl Signals {
    fn any(&self) -> bool {
        self.error.is_some() || self.transitioned
    }

    fn both(&self) -> bool {
        self.error.is_some() && self.transitioned
    }
}

#[derive(Clone)]
pub struct OutcomeProbe {
    navigator: Navigator,
    settle: Duration,
}

impl OutcomeProbe {
    /// `settle` is how long to keep watching for the complementary signal
    /// after the first one fires.
    pub fn new(navigator: Navigator, settle: Duration) -> Self {
        Self { navigator, settle }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Race "error indicator visible" against "observed state is
    /// `transition_to`" until `timeout`.
    pub async fn expect_outcome(
        &self,
        error_indicator: &ElementRef,
        transition_to: PageState,
        timeout: Duration,
    ) -> FlowResult<Outcome> {
        let interval = self.navigator.poll_interval();
        let deadline = Instant::now() + timeout;
        let mut first: Option<(Signals, Instant)> = None;

        loop {
            let sample = self.sample(error_indicator, transition_to).await?;
            let now = Instant::now();

            if sample.both() {
                warn!("Error indicator and transition to {} observed together", transition_to);
                return Ok(Outcome::Conflicting);
            }

            match &first {
                None if sample.any() => {
                    let settle_until = (now + self.settle).min(deadline.max(now));
                    first = Some((sample, settle_until));
                }
                Some((seen, _)) if sample.any() && seen.transitioned != sample.transitioned => {
                    warn!(
                        "Outcome flipped while settling (first: {}, then: {})",
                        describe(seen),
                        describe(&sample)
                    );
                    return Ok(Outcome::Conflicting);
                }
                _ => {}
            }

            match &first {
                Some((seen, settle_until)) if now >= *settle_until => {
                    let outcome = classify(seen, transition_to);
                    debug!("Probe resolved: {}", outcome);
                    return Ok(outcome);
                }
                None if now >= deadline => {
                    debug!("Probe timed out after {:?} waiting for error or {}", timeout, transition_to);
                    return Ok(Outcome::Ambiguous);
                }
                _ => {}
            }

            let wake = match &first {
                Some((_, settle_until)) => *settle_until,
                None => deadline,
            };
            sleep(interval.min(wake.saturating_duration_since(now))).await;
        }
    }

    async fn sample(&self, error_indicator: &ElementRef, transition_to: PageState) -> FlowResult<Signals> {
        let session = self.navigator.session();
        let error = if session.is_visible(error_indicator).await? {
            Some(session.text_content(error_indicator).await?)
        } else {
            None
        };
        let transitioned = self.navigator.observe().await? == transition_to;
        Ok(Signals { error, transitioned })
    }
}

fn classify(signals: &Signals, transition_to: PageState) -> Outcome {
    match &signals.error {
        Some(message) => Outcome::ErrorShown {
            message: message.clone(),
        },
        None => Outcome::Transitioned { to: transition_to },
    }
}

fn describe(signals: &Signals) -> &'static str {
    if signals.transitioned {
        "transition"
    } else {
        "error"
    }
}
