//! Mapping between abstract page states and live session observations

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::FlowResult;
use crate::session::{SessionHandle, SharedSession};
use crate::state::{PageState, SignatureTable};
use crate::wait::poll_until;

/// Observes which page the session is on. Never caches: every call reads
/// the live session.
#[derive(Clone)]
pub struct Navigator {
    session: SharedSession,
    signatures: Arc<SignatureTable>,
    poll_interval: Duration,
}

impl Navigator {
    pub fn new(session: SharedSession, signatures: Arc<SignatureTable>, poll_interval: Duration) -> Self {
        Self {
            session,
            signatures,
            poll_interval,
        }
    }

    pub fn session(&self) -> &dyn SessionHandle {
        self.session.as_ref()
    }

    pub fn shared_session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Current state, or `Unknown` if no signature matches both its URL shape
    /// and its DOM element.
    pub async fn observe(&self) -> FlowResult<PageState> {
        let url = self.session.current_url().await?;

        for signature in self.signatures.candidates(&url) {
            if self.session.is_visible(&signature.element).await? {
                return Ok(signature.state);
            }
        }

        debug!("No state signature matches {}", url);
        Ok(PageState::Unknown)
    }

    /// Wait until `state` is observed or the timeout elapses. Returns the
    /// last observation, which differs from `state` on timeout.
    pub async fn wait_for(&self, state: PageState, timeout: Duration) -> FlowResult<PageState> {
        let last = Mutex::new(PageState::Unknown);
        let seen = &last;

        let reached = poll_until(timeout, self.poll_interval, || async move {
            let observed = self.observe().await?;
            *seen.lock() = observed;
            Ok(observed == state)
        })
        .await?;

        let observed = *last.lock();
        if !reached {
            debug!("Gave up waiting for {} after {:?}; last saw {}", state, timeout, observed);
        }
        Ok(observed)
    }
}
