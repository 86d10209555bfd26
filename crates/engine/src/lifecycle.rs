//! Dismiss/reappear contract of the inline error indicator

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{FlowError, FlowResult};
use crate::probe::OutcomeProbe;
use crate::session::{ElementRef, SessionHandle};
use crate::state::PageState;
use crate::wait::poll_until;

/// Last known state of the error indicator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorLifecycle {
    pub visible: bool,
    pub message: Option<String>,
}

pub struct ErrorLifecycleTracker {
    probe: OutcomeProbe,
    indicator: ElementRef,
    dismiss_control: ElementRef,
    /// Where a submission goes when the site accepts it
    success_state: PageState,
    timeout: Duration,
    lifecycle: ErrorLifecycle,
    dismissed_message: Option<String>,
}

impl ErrorLifecycleTracker {
    pub fn new(
        probe: OutcomeProbe,
        indicator: ElementRef,
        dismiss_control: ElementRef,
        success_state: PageState,
        timeout: Duration,
    ) -> Self {
        Self {
            probe,
            indicator,
            dismiss_control,
            success_state,
            timeout,
            lifecycle: ErrorLifecycle::default(),
            dismissed_message: None,
        }
    }

    pub fn lifecycle(&self) -> &ErrorLifecycle {
        &self.lifecycle
    }

    /// Message that was showing when the error was last dismissed
    pub fn dismissed_message(&self) -> Option<&str> {
        self.dismissed_message.as_deref()
    }

    fn session(&self) -> &dyn SessionHandle {
        self.probe.navigator().session()
    }

    /// Refresh visibility and message from the live session
    pub async fn observe(&mut self) -> FlowResult<&ErrorLifecycle> {
        let visible = self.session().is_visible(&self.indicator).await?;
        let message = if visible {
            Some(self.session().text_content(&self.indicator).await?)
        } else {
            None
        };
        self.lifecycle = ErrorLifecycle { visible, message };
        Ok(&self.lifecycle)
    }

    /// Dismiss the visible error and confirm the indicator itself is gone,
    /// not just the dismiss control.
    pub async fn dismiss(&mut self) -> FlowResult<()> {
        if !self.observe().await?.visible {
            return Err(FlowError::Precondition(
                "cannot dismiss: no error is currently visible".to_string(),
            ));
        }
        let message = self.lifecycle.message.clone();

        self.session().click(&self.dismiss_control).await?;

        let session = self.probe.navigator().shared_session();
        let indicator = self.indicator.clone();
        let cleared = poll_until(self.timeout, self.probe.navigator().poll_interval(), || {
            let session = session.clone();
            let indicator = indicator.clone();
            async move { Ok(visible_instances(session.as_ref(), &indicator).await? == 0) }
        })
        .await?;

        if !cleared {
            return Err(FlowError::AssertionFailed(format!(
                "error indicator {} still visible {:?} after dismiss",
                self.indicator, self.timeout
            )));
        }

        info!("Dismissed error: {}", message.as_deref().unwrap_or(""));
        self.lifecycle = ErrorLifecycle::default();
        self.dismissed_message = message;
        Ok(())
    }

    /// Re-run the failing submission and require the same indicator to come
    /// back. Returns whether the message is unchanged.
    pub async fn reappears_on_retry<F, Fut>(&mut self, action: F) -> FlowResult<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FlowResult<()>>,
    {
        let original = self.dismissed_message.clone().ok_or_else(|| {
            FlowError::Precondition("no dismissed error to compare against".to_string())
        })?;

        let lingering = visible_instances(self.session(), &self.indicator).await?;
        if lingering > 0 {
            return Err(FlowError::Precondition(format!(
                "{} error instance(s) still visible; dismiss before retrying",
                lingering
            )));
        }

        action().await?;

        let message = self
            .probe
            .expect_outcome(&self.indicator, self.success_state, self.timeout)
            .await?
            .into_error_message()?;

        let unchanged = message == original;
        debug!("Error reappeared (unchanged: {}): {}", unchanged, message);
        self.lifecycle = ErrorLifecycle {
            visible: true,
            message: Some(message),
        };
        Ok(unchanged)
    }
}

async fn visible_instances(session: &dyn SessionHandle, indicator: &ElementRef) -> FlowResult<usize> {
    let count = session.count(indicator).await?;
    if count == 0 || !session.is_visible(indicator).await? {
        return Ok(0);
    }
    Ok(count)
}
