#![allow(dead_code)]

use std::sync::Arc;

use flowprobe_engine::{
    FlowConfig, FlowReconciler, Navigator, OutcomeProbe, Scenarios, SharedSession, SimOptions,
    SimulatedShop, Site,
};

pub const BASE: &str = "https://www.saucedemo.com/";

/// Defaults with waits short enough for an in-process shop
pub fn fast_config() -> FlowConfig {
    let mut config = FlowConfig::default();
    config.timeouts.step_ms = 300;
    config.timeouts.outcome_ms = 300;
    config.timeouts.poll_ms = 5;
    config.timeouts.settle_ms = 25;
    config.timeouts.scenario_ms = 5_000;
    config
}

pub fn shop(options: SimOptions) -> Arc<SimulatedShop> {
    Arc::new(SimulatedShop::with_options(BASE, options))
}

pub fn session(shop: &Arc<SimulatedShop>) -> SharedSession {
    shop.clone()
}

pub struct Harness {
    pub config: FlowConfig,
    pub site: Site,
    pub navigator: Navigator,
    pub reconciler: FlowReconciler,
    pub probe: OutcomeProbe,
}

pub fn harness(shop: &Arc<SimulatedShop>) -> Harness {
    let config = fast_config();
    let site = Site::saucedemo(&config).unwrap();
    let t = &config.timeouts;
    let navigator = Navigator::new(session(shop), site.signatures.clone(), t.poll());
    let reconciler = FlowReconciler::new(navigator.clone(), site.recovery.clone(), t.step());
    let probe = OutcomeProbe::new(navigator.clone(), t.settle());
    Harness {
        config,
        site,
        navigator,
        reconciler,
        probe,
    }
}

pub fn scenarios(shop: &Arc<SimulatedShop>) -> Scenarios {
    Scenarios::new(session(shop), fast_config()).unwrap()
}
