//! SauceDemo site description
//!
//! URL shapes, DOM signatures, recovery edges and scenario templates for the
//! shop. Selectors are the contractual part; error wording lives in the
//! config's message catalog.

use std::sync::Arc;

use regex::Regex;

use crate::config::FlowConfig;
use crate::error::FlowResult;
use crate::matrix::{InputField, ScenarioTemplate};
use crate::reconciler::{RecoveryEdge, RecoveryTable};
use crate::session::{ElementRef, Selector, Step};
use crate::state::{PageState, SignatureTable, StateSignature};

pub const INVENTORY_PAGE: &str = "inventory.html";
pub const CART_PAGE: &str = "cart.html";
pub const CHECKOUT_STEP_ONE_PAGE: &str = "checkout-step-one.html";
pub const CHECKOUT_STEP_TWO_PAGE: &str = "checkout-step-two.html";
pub const CHECKOUT_COMPLETE_PAGE: &str = "checkout-complete.html";

pub const COMPLETION_TEXT: &str = "Thank you for your order!";

/// Element references for the shop's pages
pub mod elements {
    use super::*;

    pub fn username_input() -> ElementRef {
        Selector::placeholder("Username").into()
    }

    pub fn password_input() -> ElementRef {
        Selector::placeholder("Password").into()
    }

    pub fn login_button() -> ElementRef {
        Selector::button("Login").into()
    }

    pub fn login_form_signature() -> ElementRef {
        Selector::css("[data-test=\"login-button\"]").into()
    }

    pub fn error_message() -> ElementRef {
        Selector::css("[data-test=\"error\"]").into()
    }

    pub fn error_dismiss() -> ElementRef {
        Selector::css("[data-test=\"error-button\"]").into()
    }

    pub fn inventory_list() -> ElementRef {
        Selector::css(".inventory_list").into()
    }

    pub fn add_to_cart_first() -> ElementRef {
        ElementRef::new(Selector::button("Add to cart")).first()
    }

    pub fn cart_link() -> ElementRef {
        Selector::css(".shopping_cart_link").into()
    }

    pub fn cart_list() -> ElementRef {
        Selector::css(".cart_list").into()
    }

    pub fn cart_item() -> ElementRef {
        ElementRef::new(Selector::css(".cart_item")).first()
    }

    pub fn checkout_button() -> ElementRef {
        Selector::button("Checkout").into()
    }

    pub fn continue_shopping_button() -> ElementRef {
        Selector::button("Continue Shopping").into()
    }

    pub fn first_name_input() -> ElementRef {
        Selector::placeholder("First Name").into()
    }

    pub fn last_name_input() -> ElementRef {
        Selector::placeholder("Last Name").into()
    }

    pub fn postal_code_input() -> ElementRef {
        Selector::placeholder("Zip/Postal Code").into()
    }

    pub fn continue_button() -> ElementRef {
        Selector::button("Continue").into()
    }

    pub fn continue_signature() -> ElementRef {
        Selector::css("#continue").into()
    }

    pub fn cancel_button() -> ElementRef {
        Selector::css("#cancel").into()
    }

    pub fn finish_button() -> ElementRef {
        Selector::button("Finish").into()
    }

    pub fn finish_signature() -> ElementRef {
        Selector::css("#finish").into()
    }

    pub fn complete_header() -> ElementRef {
        Selector::css(".complete-header").into()
    }

    pub fn back_home_button() -> ElementRef {
        Selector::button("Back Home").into()
    }
}

/// Tables and templates for one configured shop instance
#[derive(Debug, Clone)]
pub struct Site {
    pub signatures: Arc<SignatureTable>,
    pub recovery: Arc<RecoveryTable>,
    pub login: ScenarioTemplate,
    pub checkout: ScenarioTemplate,
}

impl Site {
    pub fn saucedemo(config: &FlowConfig) -> FlowResult<Self> {
        Ok(Self {
            signatures: Arc::new(signatures(&config.base_url)?),
            recovery: Arc::new(recovery_table(config)),
            login: login_template(),
            checkout: checkout_template(),
        })
    }
}

fn page_pattern(page: &str) -> FlowResult<Regex> {
    Ok(Regex::new(&format!(r"/{}(?:[?#].*)?$", regex::escape(page)))?)
}

/// State detection table. The login page is the base URL itself.
pub fn signatures(base_url: &str) -> FlowResult<SignatureTable> {
    let base = regex::escape(base_url.trim_end_matches('/'));
    let login = Regex::new(&format!(r"^{}/?(?:index\.html)?(?:[?#].*)?$", base))?;

    Ok(SignatureTable::new(vec![
        StateSignature::new(PageState::LoginPage, login, elements::login_form_signature()),
        StateSignature::new(
            PageState::InventoryPage,
            page_pattern(INVENTORY_PAGE)?,
            elements::inventory_list(),
        ),
        StateSignature::new(PageState::CartPage, page_pattern(CART_PAGE)?, elements::cart_list()),
        StateSignature::new(
            PageState::CheckoutStepOne,
            page_pattern(CHECKOUT_STEP_ONE_PAGE)?,
            elements::continue_signature(),
        ),
        StateSignature::new(
            PageState::CheckoutStepTwo,
            page_pattern(CHECKOUT_STEP_TWO_PAGE)?,
            elements::finish_signature(),
        ),
        StateSignature::new(
            PageState::CheckoutComplete,
            page_pattern(CHECKOUT_COMPLETE_PAGE)?,
            elements::complete_header(),
        ),
    ]))
}

/// Known moves between pages, including the Cancel-from-step-two detour
/// back to the inventory.
pub fn recovery_table(config: &FlowConfig) -> RecoveryTable {
    use PageState::*;

    let open = || vec![Step::navigate(config.base_url.clone())];
    let mut table = RecoveryTable::default();

    table.push(RecoveryEdge::new(Unknown, "open", LoginPage, open()));
    table.push(RecoveryEdge::new(
        LoginPage,
        "login",
        InventoryPage,
        vec![
            Step::fill(elements::username_input(), config.credentials.username.clone()),
            Step::fill(elements::password_input(), config.credentials.password.clone()),
            Step::click(elements::login_button()),
        ],
    ));
    table.push(RecoveryEdge::new(
        InventoryPage,
        "open_cart",
        CartPage,
        vec![Step::click(elements::cart_link())],
    ));
    table.push(RecoveryEdge::new(
        CartPage,
        "checkout",
        CheckoutStepOne,
        vec![Step::click(elements::checkout_button())],
    ));
    table.push(RecoveryEdge::new(
        CartPage,
        "continue_shopping",
        InventoryPage,
        vec![Step::click(elements::continue_shopping_button())],
    ));
    table.push(RecoveryEdge::new(
        CheckoutStepOne,
        "cancel",
        CartPage,
        vec![Step::click(elements::cancel_button())],
    ));
    table.push(RecoveryEdge::new(
        CheckoutStepOne,
        "continue",
        CheckoutStepTwo,
        vec![
            Step::fill(elements::first_name_input(), config.customer.first_name.clone()),
            Step::fill(elements::last_name_input(), config.customer.last_name.clone()),
            Step::fill(elements::postal_code_input(), config.customer.postal_code.clone()),
            Step::click(elements::continue_button()),
        ],
    ));
    table.push(RecoveryEdge::new(
        CheckoutStepTwo,
        "cancel",
        InventoryPage,
        vec![Step::click(elements::cancel_button())],
    ));
    table.push(RecoveryEdge::new(
        CheckoutStepTwo,
        "finish",
        CheckoutComplete,
        vec![Step::click(elements::finish_button())],
    ));
    table.push(RecoveryEdge::new(
        CheckoutComplete,
        "back_home",
        InventoryPage,
        vec![Step::click(elements::back_home_button())],
    ));

    // Any named page can start over from the login page.
    for from in [InventoryPage, CartPage, CheckoutStepOne, CheckoutStepTwo, CheckoutComplete] {
        table.push(RecoveryEdge::new(from, "open", LoginPage, open()));
    }

    table
}

pub fn login_template() -> ScenarioTemplate {
    ScenarioTemplate {
        name: "login".to_string(),
        start: PageState::LoginPage,
        fields: vec![
            (InputField::Username, elements::username_input()),
            (InputField::Password, elements::password_input()),
        ],
        submit: elements::login_button(),
        error_indicator: elements::error_message(),
        dismiss_control: Some(elements::error_dismiss()),
        success_state: PageState::InventoryPage,
    }
}

pub fn checkout_template() -> ScenarioTemplate {
    ScenarioTemplate {
        name: "checkout".to_string(),
        start: PageState::CheckoutStepOne,
        fields: vec![
            (InputField::FirstName, elements::first_name_input()),
            (InputField::LastName, elements::last_name_input()),
            (InputField::PostalCode, elements::postal_code_input()),
        ],
        submit: elements::continue_button(),
        error_indicator: elements::error_message(),
        dismiss_control: Some(elements::error_dismiss()),
        success_state: PageState::CheckoutStepTwo,
    }
}
