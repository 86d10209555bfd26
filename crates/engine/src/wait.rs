//! Bounded cooperative polling

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::error::FlowResult;

/// Poll `check` every `interval` until it returns `true` or `timeout` elapses.
///
/// The check always runs at least once, and once more at the deadline, so a
/// zero timeout degenerates to a single sample. Returns whether the
/// condition was met. Errors from the check abort the wait.
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> FlowResult<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FlowResult<bool>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        if check().await? {
            return Ok(true);
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }

        sleep(interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_poll_until_met_after_some_samples() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let met = poll_until(Duration::from_secs(1), Duration::from_millis(1), || async move {
            Ok(calls.fetch_add(1, Ordering::SeqCst) >= 2)
        })
        .await
        .unwrap();

        assert!(met);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_until_times_out() {
        let met = poll_until(Duration::from_millis(20), Duration::from_millis(5), || async {
            Ok(false)
        })
        .await
        .unwrap();
        assert!(!met);
    }

    #[tokio::test]
    async fn test_zero_timeout_samples_once() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let met = poll_until(Duration::ZERO, Duration::from_millis(5), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        })
        .await
        .unwrap();
        assert!(!met);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_check_error_propagates() {
        let result = poll_until(Duration::from_secs(1), Duration::from_millis(1), || async {
            Err(FlowError::Driver("page crashed".into()))
        })
        .await;
        assert!(matches!(result, Err(FlowError::Driver(_))));
    }
}
