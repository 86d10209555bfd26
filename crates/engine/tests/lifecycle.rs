mod common;

use std::time::Duration;

use common::{harness, shop, Harness};
use flowprobe_engine::site::elements;
use flowprobe_engine::{ErrorLifecycleTracker, FlowError, PageState, SessionHandle, SimOptions};

fn login_tracker(h: &Harness) -> ErrorLifecycleTracker {
    ErrorLifecycleTracker::new(
        h.probe.clone(),
        elements::error_message(),
        elements::error_dismiss(),
        PageState::InventoryPage,
        Duration::from_millis(200),
    )
}

async fn fail_login(h: &Harness) {
    h.reconciler.reconcile(PageState::LoginPage).await.unwrap();
    let session = h.navigator.session();
    session.fill(&elements::username_input(), "standard_user").await.unwrap();
    session.fill(&elements::password_input(), "wrong_password").await.unwrap();
    session.click(&elements::login_button()).await.unwrap();
}

#[tokio::test]
async fn dismiss_without_visible_error_is_a_precondition_failure() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);
    h.reconciler.reconcile(PageState::LoginPage).await.unwrap();

    let mut tracker = login_tracker(&h);
    let err = tracker.dismiss().await.unwrap_err();
    assert!(matches!(err, FlowError::Precondition(_)));
}

#[tokio::test]
async fn dismiss_clears_every_instance_and_is_not_repeatable() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);
    fail_login(&h).await;

    let mut tracker = login_tracker(&h);
    assert!(tracker.observe().await.unwrap().visible);
    tracker.dismiss().await.unwrap();

    assert_eq!(shop.count(&elements::error_message()).await.unwrap(), 0);
    assert!(!tracker.lifecycle().visible);
    assert!(tracker
        .dismissed_message()
        .unwrap()
        .contains("do not match any user"));

    let err = tracker.dismiss().await.unwrap_err();
    assert_eq!(err.kind(), "precondition");
}

#[tokio::test]
async fn dismiss_that_does_nothing_fails() {
    let shop = shop(SimOptions {
        sticky_error: true,
        ..Default::default()
    });
    let h = harness(&shop);
    fail_login(&h).await;

    let err = login_tracker(&h).dismiss().await.unwrap_err();
    assert_eq!(err.kind(), "assertion_failed");
}

#[tokio::test]
async fn error_reappears_unchanged_after_dismissal() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);
    fail_login(&h).await;

    let mut tracker = login_tracker(&h);
    tracker.dismiss().await.unwrap();

    let session = h.navigator.shared_session();
    let unchanged = tracker
        .reappears_on_retry(|| async move { session.click(&elements::login_button()).await })
        .await
        .unwrap();

    assert!(unchanged);
    assert!(tracker.lifecycle().visible);
    assert_eq!(
        tracker.lifecycle().message.as_deref(),
        tracker.dismissed_message()
    );
}

#[tokio::test]
async fn changed_message_is_reported() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);
    fail_login(&h).await;

    let mut tracker = login_tracker(&h);
    tracker.dismiss().await.unwrap();

    let session = h.navigator.shared_session();
    let unchanged = tracker
        .reappears_on_retry(|| async move {
            session.fill(&elements::password_input(), "").await?;
            session.click(&elements::login_button()).await
        })
        .await
        .unwrap();

    assert!(!unchanged);
    assert_eq!(
        tracker.lifecycle().message.as_deref(),
        Some("Epic sadface: Password is required")
    );
}

#[tokio::test]
async fn retry_before_dismissal_is_rejected() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);
    fail_login(&h).await;

    let mut tracker = login_tracker(&h);
    let err = tracker
        .reappears_on_retry(|| async { Ok(()) })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "precondition");
}

#[tokio::test]
async fn retry_that_succeeds_is_not_a_reappearance() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);
    fail_login(&h).await;

    let mut tracker = login_tracker(&h);
    tracker.dismiss().await.unwrap();

    let session = h.navigator.shared_session();
    let err = tracker
        .reappears_on_retry(|| async move {
            session.fill(&elements::password_input(), "secret_sauce").await?;
            session.click(&elements::login_button()).await
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unexpected_outcome");
}
