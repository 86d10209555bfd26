mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{harness, shop, BASE};
use flowprobe_engine::site::elements;
use flowprobe_engine::{
    FlowError, FlowReconciler, PageState, RecoveryTable, SessionHandle, SimOptions,
};
use test_case::test_case;

#[tokio::test]
async fn blank_session_observes_unknown() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);
    assert_eq!(h.navigator.observe().await.unwrap(), PageState::Unknown);
}

/// The URL flips before the page renders; that alone is not a state.
#[tokio::test]
async fn url_without_signature_is_unknown() {
    let shop = shop(SimOptions {
        render_delay: Duration::from_millis(60),
        ..Default::default()
    });
    let h = harness(&shop);

    shop.navigate_to(BASE).await.unwrap();
    assert_eq!(shop.current_url().await.unwrap(), BASE);
    assert_eq!(h.navigator.observe().await.unwrap(), PageState::Unknown);

    let seen = h
        .navigator
        .wait_for(PageState::LoginPage, Duration::from_millis(500))
        .await
        .unwrap();
    assert_eq!(seen, PageState::LoginPage);
}

#[tokio::test]
async fn unmapped_url_is_unknown() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);

    shop.navigate_to(&format!("{}inventory-item.html?id=4", BASE))
        .await
        .unwrap();
    assert_eq!(h.navigator.observe().await.unwrap(), PageState::Unknown);
}

#[tokio::test]
async fn wait_for_returns_last_observation_on_timeout() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);
    shop.navigate_to(BASE).await.unwrap();

    let seen = h
        .navigator
        .wait_for(PageState::CartPage, Duration::from_millis(30))
        .await
        .unwrap();
    assert_eq!(seen, PageState::LoginPage);
}

#[test_case(PageState::LoginPage ; "login page")]
#[test_case(PageState::InventoryPage ; "inventory")]
#[test_case(PageState::CartPage ; "cart")]
#[test_case(PageState::CheckoutStepOne ; "checkout step one")]
#[test_case(PageState::CheckoutStepTwo ; "checkout step two")]
#[test_case(PageState::CheckoutComplete ; "checkout complete")]
#[tokio::test]
async fn reconcile_from_blank_reaches(target: PageState) {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);

    h.reconciler.reconcile(target).await.unwrap();
    assert_eq!(h.navigator.observe().await.unwrap(), target);
}

#[tokio::test]
async fn reconcile_is_a_no_op_when_already_there() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);

    h.reconciler.reconcile(PageState::CartPage).await.unwrap();
    let visits = shop.visits().len();
    h.reconciler.reconcile(PageState::CartPage).await.unwrap();
    assert_eq!(shop.visits().len(), visits);
}

#[tokio::test]
async fn reconcile_from_step_two_to_step_one_goes_through_inventory() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);
    h.reconciler.reconcile(PageState::CheckoutStepTwo).await.unwrap();

    let before = shop.visits().len();
    h.reconciler.reconcile(PageState::CheckoutStepOne).await.unwrap();

    let tail: Vec<String> = shop.visits()[before..].to_vec();
    assert_eq!(
        tail,
        vec![
            format!("{}inventory.html", BASE),
            format!("{}cart.html", BASE),
            format!("{}checkout-step-one.html", BASE),
        ]
    );
}

#[tokio::test]
async fn one_unexpected_landing_is_absorbed() {
    let shop = shop(SimOptions {
        checkout_bounces: 1,
        ..Default::default()
    });
    let h = harness(&shop);

    h.reconciler.reconcile(PageState::CheckoutStepOne).await.unwrap();
    assert_eq!(h.navigator.observe().await.unwrap(), PageState::CheckoutStepOne);
}

#[tokio::test]
async fn second_unexpected_landing_is_fatal() {
    let shop = shop(SimOptions {
        checkout_bounces: 2,
        ..Default::default()
    });
    let h = harness(&shop);

    let err = h
        .reconciler
        .reconcile(PageState::CheckoutStepOne)
        .await
        .unwrap_err();
    match err {
        FlowError::StateMismatch { expected, observed, .. } => {
            assert_eq!(expected, PageState::CheckoutStepOne);
            assert_eq!(observed, PageState::InventoryPage);
        }
        other => panic!("expected state mismatch, got {other}"),
    }
}

#[tokio::test]
async fn reconcile_to_unknown_is_rejected() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);

    let err = h.reconciler.reconcile(PageState::Unknown).await.unwrap_err();
    assert_eq!(err.kind(), "precondition");
}

#[tokio::test]
async fn reconcile_without_a_recovery_path_is_a_mismatch() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);

    let without_open: Vec<_> = h
        .site
        .recovery
        .edges()
        .iter()
        .filter(|e| e.action != "open")
        .cloned()
        .collect();
    let reconciler = FlowReconciler::new(
        h.navigator.clone(),
        Arc::new(RecoveryTable::new(without_open)),
        h.config.timeouts.step(),
    );
    assert!(reconciler.plan(PageState::Unknown, PageState::LoginPage).is_none());

    let err = reconciler.reconcile(PageState::LoginPage).await.unwrap_err();
    match err {
        FlowError::StateMismatch {
            expected,
            observed,
            detail,
        } => {
            assert_eq!(expected, PageState::LoginPage);
            assert_eq!(observed, PageState::Unknown);
            assert_eq!(detail, "no recovery path in table");
        }
        other => panic!("expected state mismatch, got {other}"),
    }
    assert!(shop.visits().is_empty());
}

#[tokio::test]
async fn traverse_requires_the_declared_start() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);
    h.reconciler.reconcile(PageState::CartPage).await.unwrap();

    let err = h
        .reconciler
        .traverse(PageState::CheckoutStepOne, "cancel")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "state_mismatch");
}

#[tokio::test]
async fn traverse_rejects_undeclared_action() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);
    h.reconciler.reconcile(PageState::CartPage).await.unwrap();

    let err = h.reconciler.traverse(PageState::CartPage, "finish").await.unwrap_err();
    assert_eq!(err.kind(), "precondition");
}

#[tokio::test]
async fn login_edge_leaves_no_error_behind() {
    let shop = shop(SimOptions::default());
    let h = harness(&shop);

    h.reconciler.reconcile(PageState::InventoryPage).await.unwrap();
    assert!(shop.is_logged_in());
    assert!(!shop.is_visible(&elements::error_message()).await.unwrap());
}
