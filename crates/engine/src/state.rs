//! Page states and the signatures used to detect them

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::session::ElementRef;

/// A named point in the purchase flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    LoginPage,
    InventoryPage,
    CartPage,
    CheckoutStepOne,
    CheckoutStepTwo,
    CheckoutComplete,
    /// Only ever transient: mid-navigation or off the map.
    Unknown,
}

impl PageState {
    pub const NAMED: [PageState; 6] = [
        PageState::LoginPage,
        PageState::InventoryPage,
        PageState::CartPage,
        PageState::CheckoutStepOne,
        PageState::CheckoutStepTwo,
        PageState::CheckoutComplete,
    ];

    pub fn is_named(&self) -> bool {
        !matches!(self, PageState::Unknown)
    }
}

impl Default for PageState {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for PageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageState::LoginPage => write!(f, "login_page"),
            PageState::InventoryPage => write!(f, "inventory_page"),
            PageState::CartPage => write!(f, "cart_page"),
            PageState::CheckoutStepOne => write!(f, "checkout_step_one"),
            PageState::CheckoutStepTwo => write!(f, "checkout_step_two"),
            PageState::CheckoutComplete => write!(f, "checkout_complete"),
            PageState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Detection predicate for one state: URL shape plus a DOM signature.
///
/// Both must hold. A URL alone flips before the page renders, and a
/// signature alone can linger while the next page loads.
#[derive(Debug, Clone)]
pub struct StateSignature {
    pub state: PageState,
    pub url: Regex,
    pub element: ElementRef,
}

impl StateSignature {
    pub fn new(state: PageState, url: Regex, element: ElementRef) -> Self {
        Self { state, url, element }
    }

    pub fn url_matches(&self, url: &str) -> bool {
        self.url.is_match(url)
    }
}

/// Ordered table of state signatures; first match wins.
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    signatures: Vec<StateSignature>,
}

impl SignatureTable {
    pub fn new(signatures: Vec<StateSignature>) -> Self {
        Self { signatures }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateSignature> {
        self.signatures.iter()
    }

    pub fn get(&self, state: PageState) -> Option<&StateSignature> {
        self.signatures.iter().find(|s| s.state == state)
    }

    /// Signatures whose URL shape matches; the DOM check is left to the caller.
    pub fn candidates<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a StateSignature> + 'a {
        self.signatures.iter().filter(move |s| s.url_matches(url))
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}
