//! Flowprobe Engine
//!
//! Drives a browser session through a multi-step purchase flow and asserts
//! on what each submission did.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Scenarios / ScenarioMatrix                                 │
//! │    ├── reconcile to the template's start state              │
//! │    ├── fill inputs, submit                                  │
//! │    └── probe + verify expected outcome                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  FlowReconciler        OutcomeProbe    ErrorLifecycleTracker│
//! │    └── RecoveryTable     └── settle      └── dismiss/retry  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Navigator (URL shape + DOM signature -> PageState)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SessionHandle (Playwright bridge | SimulatedShop)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod matrix;
pub mod navigator;
pub mod outcome;
pub mod probe;
pub mod reconciler;
pub mod scenarios;
pub mod session;
pub mod sim;
pub mod site;
pub mod state;
pub mod wait;

pub use config::{FlowConfig, MessageCatalog, TimeoutConfig};
pub use error::{FlowError, FlowResult};
pub use lifecycle::{ErrorLifecycle, ErrorLifecycleTracker};
pub use matrix::{
    CaseInputs, CaseReport, Credentials, FormFields, InputField, MatrixReport, ScenarioCase,
    ScenarioMatrix, ScenarioTemplate,
};
pub use navigator::Navigator;
pub use outcome::{ExpectedOutcome, MessagePattern, Outcome};
pub use probe::OutcomeProbe;
pub use reconciler::{FlowReconciler, RecoveryEdge, RecoveryTable};
pub use scenarios::Scenarios;
pub use session::{ElementRef, Selector, SessionHandle, SharedSession, Step};
pub use sim::{SimOptions, SimulatedShop};
pub use site::Site;
pub use state::{PageState, SignatureTable, StateSignature};

/// Flowprobe version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
