//! In-process simulated shop
//!
//! Serves the same URL shapes, selectors, validation wording and page
//! transitions as the SauceDemo pages the engine drives, without a browser.
//! [`SimOptions`] make it misbehave the way a live site sometimes does: slow
//! rendering, bounced navigation, swallowed or contradictory submissions.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{FlowError, FlowResult};
use crate::session::{ElementRef, Selector, SessionHandle};
use crate::site::{
    CART_PAGE, CHECKOUT_COMPLETE_PAGE, CHECKOUT_STEP_ONE_PAGE, CHECKOUT_STEP_TWO_PAGE, COMPLETION_TEXT,
    INVENTORY_PAGE,
};

pub const VALID_PASSWORD: &str = "secret_sauce";

pub const USERS: [&str; 6] = [
    "standard_user",
    "locked_out_user",
    "problem_user",
    "performance_glitch_user",
    "error_user",
    "visual_user",
];

const LOCKED_OUT_USER: &str = "locked_out_user";

const PRODUCTS: [&str; 6] = [
    "Sauce Labs Backpack",
    "Sauce Labs Bike Light",
    "Sauce Labs Bolt T-Shirt",
    "Sauce Labs Fleece Jacket",
    "Sauce Labs Onesie",
    "Test.allTheThings() T-Shirt (Red)",
];

const ERROR_INDICATOR: &str = "[data-test=\"error\"]";
const ERROR_BUTTON: &str = "[data-test=\"error-button\"]";

/// Misbehaviors the simulated shop can be told to show
#[derive(Debug, Clone, Default)]
pub struct SimOptions {
    /// Time between a URL change and the new page's DOM, and before an inline
    /// error renders
    pub render_delay: Duration,
    /// Number of Checkout clicks that land back on the inventory
    pub checkout_bounces: u32,
    /// Login and Continue clicks are swallowed
    pub stalled_submit: bool,
    /// Rejected submissions show their error, then navigate to the next page
    /// anyway after this long
    pub error_then_redirect: Option<Duration>,
    /// Accepted submissions leave a generic error visible on the next page
    pub error_on_success: bool,
    /// The dismiss control does nothing
    pub sticky_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Blank,
    Login,
    Inventory,
    Cart,
    StepOne,
    StepTwo,
    Complete,
    NotFound,
}

impl Page {
    fn path(self) -> &'static str {
        match self {
            Page::Login | Page::Blank | Page::NotFound => "",
            Page::Inventory => INVENTORY_PAGE,
            Page::Cart => CART_PAGE,
            Page::StepOne => CHECKOUT_STEP_ONE_PAGE,
            Page::StepTwo => CHECKOUT_STEP_TWO_PAGE,
            Page::Complete => CHECKOUT_COMPLETE_PAGE,
        }
    }

    fn from_path(path: &str) -> Page {
        match path {
            "" | "index.html" => Page::Login,
            INVENTORY_PAGE => Page::Inventory,
            CART_PAGE => Page::Cart,
            CHECKOUT_STEP_ONE_PAGE => Page::StepOne,
            CHECKOUT_STEP_TWO_PAGE => Page::StepTwo,
            CHECKOUT_COMPLETE_PAGE => Page::Complete,
            _ => Page::NotFound,
        }
    }

    fn requires_login(self) -> bool {
        !matches!(self, Page::Login | Page::Blank | Page::NotFound)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Login,
    AddToCart(usize),
    Remove(usize),
    OpenCart,
    Checkout,
    ContinueShopping,
    Cancel,
    Continue,
    Finish,
    BackHome,
    DismissError,
}

/// A rendered element. CSS selectors match by exact string against `css`.
#[derive(Debug, Clone)]
struct Node {
    role: Option<&'static str>,
    name: String,
    placeholder: Option<&'static str>,
    css: Vec<&'static str>,
    on_click: Option<Action>,
}

impl Node {
    fn button(name: impl Into<String>, css: Vec<&'static str>, action: Action) -> Self {
        Self {
            role: Some("button"),
            name: name.into(),
            placeholder: None,
            css,
            on_click: Some(action),
        }
    }

    fn input(placeholder: &'static str, css: Vec<&'static str>) -> Self {
        Self {
            role: Some("textbox"),
            name: String::new(),
            placeholder: Some(placeholder),
            css,
            on_click: None,
        }
    }

    fn text(text: impl Into<String>, css: Vec<&'static str>) -> Self {
        Self {
            role: None,
            name: text.into(),
            placeholder: None,
            css,
            on_click: None,
        }
    }

    fn link(css: Vec<&'static str>, action: Action) -> Self {
        Self {
            role: Some("link"),
            name: String::new(),
            placeholder: None,
            css,
            on_click: Some(action),
        }
    }

    fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Role { role, name } => {
                self.role == Some(role.as_str()) && self.name.eq_ignore_ascii_case(name)
            }
            Selector::Placeholder { text } => self.placeholder == Some(text.as_str()),
            Selector::Text { text } => self.role.is_none() && self.name == *text,
            Selector::Css { css } => self.css.iter().any(|c| c == css),
        }
    }
}

struct ShopState {
    base_url: String,
    options: SimOptions,
    url: String,
    rendered: Page,
    pending_render: Option<(Instant, Page)>,
    scheduled: Option<(Instant, Page)>,
    logged_in: bool,
    cart: Vec<usize>,
    inputs: HashMap<&'static str, String>,
    error: Option<String>,
    pending_error: Option<(Instant, String)>,
    visits: Vec<String>,
}

impl ShopState {
    fn url_of(&self, page: Page) -> String {
        format!("{}{}", self.base_url, page.path())
    }

    /// Apply whatever the clock says should have happened by now
    fn tick(&mut self) {
        let now = Instant::now();

        if let Some((at, page)) = self.scheduled {
            if at <= now {
                self.scheduled = None;
                debug!("Simulated redirect to {:?}", page);
                if page.requires_login() {
                    self.logged_in = true;
                }
                self.goto(page);
            }
        }
        if let Some((at, page)) = self.pending_render {
            if at <= now {
                self.pending_render = None;
                self.rendered = page;
            }
        }
        if self.pending_error.as_ref().map_or(false, |(at, _)| *at <= now) {
            self.error = self.pending_error.take().map(|(_, message)| message);
        }
    }

    fn goto(&mut self, page: Page) {
        self.url = self.url_of(page);
        self.visits.push(self.url.clone());
        self.inputs.clear();
        self.error = None;
        self.pending_error = None;
        self.scheduled = None;

        if self.options.render_delay.is_zero() {
            self.rendered = page;
            self.pending_render = None;
        } else {
            self.rendered = Page::Blank;
            self.pending_render = Some((Instant::now() + self.options.render_delay, page));
        }
    }

    fn show_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.options.render_delay.is_zero() {
            self.error = Some(message);
        } else {
            self.error = None;
            self.pending_error = Some((Instant::now() + self.options.render_delay, message));
        }
    }

    fn navigate(&mut self, url: &str) {
        let page = self.resolve_url(url);
        if page.requires_login() && !self.logged_in {
            self.goto(Page::Login);
            self.show_error(format!(
                "Epic sadface: You can only access '/{}' when you are logged in.",
                page.path()
            ));
            return;
        }

        self.goto(page);
        if page == Page::NotFound {
            self.url = url.to_string();
            if let Some(last) = self.visits.last_mut() {
                *last = url.to_string();
            }
        }
    }

    fn resolve_url(&self, url: &str) -> Page {
        let path = match url.strip_prefix(&self.base_url) {
            Some(rest) => rest,
            None if url == self.base_url.trim_end_matches('/') => "",
            None => return Page::NotFound,
        };
        let path = path.split(['?', '#']).next().unwrap_or_default();
        Page::from_path(path)
    }

    fn nodes(&self) -> Vec<Node> {
        let mut nodes = match self.rendered {
            Page::Blank | Page::NotFound => return Vec::new(),
            Page::Login => vec![
                Node::input("Username", vec!["#user-name", "[data-test=\"username\"]"]),
                Node::input("Password", vec!["#password", "[data-test=\"password\"]"]),
                Node::button(
                    "Login",
                    vec!["#login-button", "[data-test=\"login-button\"]"],
                    Action::Login,
                ),
            ],
            Page::Inventory => {
                let mut nodes = vec![
                    Node::text("", vec![".inventory_list"]),
                    Node::link(vec![".shopping_cart_link"], Action::OpenCart),
                ];
                for (i, product) in PRODUCTS.iter().enumerate() {
                    nodes.push(Node::text(*product, vec![".inventory_item_name"]));
                    if self.cart.contains(&i) {
                        nodes.push(Node::button("Remove", vec![".btn_inventory"], Action::Remove(i)));
                    } else {
                        nodes.push(Node::button("Add to cart", vec![".btn_inventory"], Action::AddToCart(i)));
                    }
                }
                nodes
            }
            Page::Cart => {
                let mut nodes = vec![
                    Node::text("", vec![".cart_list"]),
                    Node::link(vec![".shopping_cart_link"], Action::OpenCart),
                    Node::button("Continue Shopping", vec!["#continue-shopping"], Action::ContinueShopping),
                    Node::button("Checkout", vec!["#checkout"], Action::Checkout),
                ];
                for &i in &self.cart {
                    nodes.push(Node::text(PRODUCTS[i], vec![".cart_item"]));
                    nodes.push(Node::button("Remove", vec![".cart_button"], Action::Remove(i)));
                }
                nodes
            }
            Page::StepOne => vec![
                Node::input("First Name", vec!["#first-name"]),
                Node::input("Last Name", vec!["#last-name"]),
                Node::input("Zip/Postal Code", vec!["#postal-code"]),
                Node::button("Cancel", vec!["#cancel"], Action::Cancel),
                Node::button("Continue", vec!["#continue"], Action::Continue),
            ],
            Page::StepTwo => {
                let mut nodes = vec![
                    Node::text("", vec![".cart_list"]),
                    Node::button("Cancel", vec!["#cancel"], Action::Cancel),
                    Node::button("Finish", vec!["#finish"], Action::Finish),
                ];
                for &i in &self.cart {
                    nodes.push(Node::text(PRODUCTS[i], vec![".cart_item"]));
                }
                nodes
            }
            Page::Complete => vec![
                Node::text(COMPLETION_TEXT, vec![".complete-header"]),
                Node::button("Back Home", vec!["#back-to-products"], Action::BackHome),
            ],
        };

        if let Some(message) = &self.error {
            nodes.push(Node::text(message.clone(), vec![ERROR_INDICATOR]));
            nodes.push(Node::button("", vec![ERROR_BUTTON, ".error-button"], Action::DismissError));
        }
        nodes
    }

    fn matching(&self, element: &ElementRef) -> Vec<Node> {
        let all: Vec<Node> = self
            .nodes()
            .into_iter()
            .filter(|n| n.matches(&element.selector))
            .collect();
        match element.nth {
            Some(n) => all.into_iter().nth(n).into_iter().collect(),
            None => all,
        }
    }

    /// Exactly one element, as a strict locator would require
    fn single(&self, element: &ElementRef) -> FlowResult<Node> {
        let mut found = self.matching(element);
        match found.len() {
            0 => Err(FlowError::Driver(format!("no element matches {} on {}", element, self.url))),
            1 => Ok(found.remove(0)),
            n => Err(FlowError::Driver(format!(
                "strict mode violation: {} resolved to {} elements",
                element, n
            ))),
        }
    }

    fn input(&self, placeholder: &str) -> &str {
        self.inputs.get(placeholder).map(String::as_str).unwrap_or_default()
    }

    fn check_login(&self) -> Result<(), &'static str> {
        let username = self.input("Username");
        let password = self.input("Password");

        if username.is_empty() {
            return Err("Epic sadface: Username is required");
        }
        if password.is_empty() {
            return Err("Epic sadface: Password is required");
        }
        if !USERS.contains(&username) || password != VALID_PASSWORD {
            return Err("Epic sadface: Username and password do not match any user in this service");
        }
        if username == LOCKED_OUT_USER {
            return Err("Epic sadface: Sorry, this user has been locked out.");
        }
        Ok(())
    }

    fn check_customer(&self) -> Result<(), &'static str> {
        if self.input("First Name").is_empty() {
            return Err("Error: First Name is required");
        }
        if self.input("Last Name").is_empty() {
            return Err("Error: Last Name is required");
        }
        if self.input("Zip/Postal Code").is_empty() {
            return Err("Error: Postal Code is required");
        }
        Ok(())
    }

    fn submit(&mut self, verdict: Result<(), &'static str>, next: Page) {
        if self.options.stalled_submit {
            debug!("Simulated submit swallowed");
            return;
        }

        match verdict {
            Ok(()) => {
                if next == Page::Inventory {
                    self.logged_in = true;
                }
                self.goto(next);
                if self.options.error_on_success {
                    self.show_error("Epic sadface: Something went wrong");
                }
            }
            Err(message) => {
                self.show_error(message);
                if let Some(delay) = self.options.error_then_redirect {
                    self.scheduled = Some((Instant::now() + delay, next));
                }
            }
        }
    }

    fn perform(&mut self, action: Action) {
        debug!("Simulated click: {:?}", action);
        match action {
            Action::Login => {
                let verdict = self.check_login();
                self.submit(verdict, Page::Inventory);
            }
            Action::Continue => {
                let verdict = self.check_customer();
                self.submit(verdict, Page::StepTwo);
            }
            Action::AddToCart(i) => self.cart.push(i),
            Action::Remove(i) => self.cart.retain(|&c| c != i),
            Action::OpenCart => self.goto(Page::Cart),
            Action::Checkout => {
                if self.options.checkout_bounces > 0 {
                    self.options.checkout_bounces -= 1;
                    self.goto(Page::Inventory);
                } else {
                    self.goto(Page::StepOne);
                }
            }
            Action::ContinueShopping | Action::BackHome => self.goto(Page::Inventory),
            Action::Cancel => match self.rendered {
                Page::StepOne => self.goto(Page::Cart),
                _ => self.goto(Page::Inventory),
            },
            Action::Finish => {
                self.cart.clear();
                self.goto(Page::Complete);
            }
            Action::DismissError => {
                if !self.options.sticky_error {
                    self.error = None;
                    self.pending_error = None;
                }
            }
        }
    }
}

/// A [`SessionHandle`] over the simulated shop
pub struct SimulatedShop {
    state: Mutex<ShopState>,
}

impl SimulatedShop {
    pub fn new(base_url: &str) -> Self {
        Self::with_options(base_url, SimOptions::default())
    }

    pub fn with_options(base_url: &str, options: SimOptions) -> Self {
        let base_url = format!("{}/", base_url.trim_end_matches('/'));
        Self {
            state: Mutex::new(ShopState {
                base_url,
                options,
                url: "about:blank".to_string(),
                rendered: Page::Blank,
                pending_render: None,
                scheduled: None,
                logged_in: false,
                cart: Vec::new(),
                inputs: HashMap::new(),
                error: None,
                pending_error: None,
                visits: Vec::new(),
            }),
        }
    }

    /// Change quirks mid-session
    pub fn configure(&self, update: impl FnOnce(&mut SimOptions)) {
        update(&mut self.state.lock().options);
    }

    /// Every URL the shop has loaded, redirects included
    pub fn visits(&self) -> Vec<String> {
        self.state.lock().visits.clone()
    }

    pub fn cart_size(&self) -> usize {
        self.state.lock().cart.len()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.lock().logged_in
    }
}

#[async_trait]
impl SessionHandle for SimulatedShop {
    async fn navigate_to(&self, url: &str) -> FlowResult<()> {
        let mut state = self.state.lock();
        state.tick();
        state.navigate(url);
        Ok(())
    }

    async fn current_url(&self) -> FlowResult<String> {
        let mut state = self.state.lock();
        state.tick();
        Ok(state.url.clone())
    }

    async fn click(&self, element: &ElementRef) -> FlowResult<()> {
        let mut state = self.state.lock();
        state.tick();
        let node = state.single(element)?;
        if let Some(action) = node.on_click {
            state.perform(action);
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementRef, text: &str) -> FlowResult<()> {
        let mut state = self.state.lock();
        state.tick();
        let node = state.single(element)?;
        let placeholder = node
            .placeholder
            .ok_or_else(|| FlowError::Driver(format!("{} is not an input", element)))?;
        state.inputs.insert(placeholder, text.to_string());
        Ok(())
    }

    async fn is_visible(&self, element: &ElementRef) -> FlowResult<bool> {
        let mut state = self.state.lock();
        state.tick();
        Ok(!state.matching(element).is_empty())
    }

    async fn text_content(&self, element: &ElementRef) -> FlowResult<String> {
        let mut state = self.state.lock();
        state.tick();
        Ok(state.single(element)?.name)
    }

    async fn count(&self, element: &ElementRef) -> FlowResult<usize> {
        let mut state = self.state.lock();
        state.tick();
        Ok(state.matching(element).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::elements;

    const BASE: &str = "https://www.saucedemo.com/";

    async fn login(shop: &SimulatedShop, username: &str, password: &str) {
        shop.navigate_to(BASE).await.unwrap();
        shop.fill(&elements::username_input(), username).await.unwrap();
        shop.fill(&elements::password_input(), password).await.unwrap();
        shop.click(&elements::login_button()).await.unwrap();
    }

    #[tokio::test]
    async fn test_valid_login_lands_on_inventory() {
        let shop = SimulatedShop::new(BASE);
        login(&shop, "standard_user", VALID_PASSWORD).await;

        assert_eq!(shop.current_url().await.unwrap(), format!("{}inventory.html", BASE));
        assert!(shop.is_visible(&elements::inventory_list()).await.unwrap());
        assert_eq!(shop.count(&Selector::button("Add to cart").into()).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_locked_out_user_sees_error() {
        let shop = SimulatedShop::new(BASE);
        login(&shop, LOCKED_OUT_USER, VALID_PASSWORD).await;

        assert!(!shop.is_logged_in());
        assert_eq!(
            shop.text_content(&elements::error_message()).await.unwrap(),
            "Epic sadface: Sorry, this user has been locked out."
        );
    }

    #[tokio::test]
    async fn test_deep_link_requires_login() {
        let shop = SimulatedShop::new(BASE);
        shop.navigate_to(&format!("{}cart.html", BASE)).await.unwrap();

        assert_eq!(shop.current_url().await.unwrap(), BASE);
        let text = shop.text_content(&elements::error_message()).await.unwrap();
        assert!(text.contains("when you are logged in"));
    }

    #[tokio::test]
    async fn test_click_is_strict() {
        let shop = SimulatedShop::new(BASE);
        login(&shop, "standard_user", VALID_PASSWORD).await;

        let err = shop
            .click(&Selector::button("Add to cart").into())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("strict mode violation"));

        shop.click(&elements::add_to_cart_first()).await.unwrap();
        assert_eq!(shop.cart_size(), 1);
    }

    #[tokio::test]
    async fn test_render_delay_changes_url_before_dom() {
        let shop = SimulatedShop::with_options(
            BASE,
            SimOptions {
                render_delay: Duration::from_millis(50),
                ..Default::default()
            },
        );
        shop.navigate_to(BASE).await.unwrap();

        assert_eq!(shop.current_url().await.unwrap(), BASE);
        assert!(!shop.is_visible(&elements::login_form_signature()).await.unwrap());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(shop.is_visible(&elements::login_form_signature()).await.unwrap());
    }
}
