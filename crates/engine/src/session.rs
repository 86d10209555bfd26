//! Browser session capability consumed from the automation driver
//!
//! The engine never talks to a browser directly. Drivers (the Playwright
//! bridge, the simulated shop) implement [`SessionHandle`]; everything above
//! this module works against `Arc<dyn SessionHandle>`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FlowResult;

/// How an element is located
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Selector {
    /// ARIA role plus accessible name (case-insensitive, whole name)
    Role { role: String, name: String },
    /// Input by placeholder attribute
    Placeholder { text: String },
    /// Element by exact visible text
    Text { text: String },
    /// Plain CSS selector
    Css { css: String },
}

impl Selector {
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    pub fn button(name: impl Into<String>) -> Self {
        Self::role("button", name)
    }

    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::Placeholder { text: text.into() }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn css(css: impl Into<String>) -> Self {
        Self::Css { css: css.into() }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Role { role, name } => write!(f, "role={}[name=\"{}\"]", role, name),
            Selector::Placeholder { text } => write!(f, "placeholder=\"{}\"", text),
            Selector::Text { text } => write!(f, "text=\"{}\"", text),
            Selector::Css { css } => write!(f, "css={}", css),
        }
    }
}

/// A lazily resolved element reference, optionally pinned to the nth match
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    pub selector: Selector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth: Option<usize>,
}

impl ElementRef {
    pub fn new(selector: Selector) -> Self {
        Self { selector, nth: None }
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    pub fn first(self) -> Self {
        self.nth(0)
    }
}

impl From<Selector> for ElementRef {
    fn from(selector: Selector) -> Self {
        Self::new(selector)
    }
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.nth {
            Some(n) => write!(f, "{} >> nth={}", self.selector, n),
            None => write!(f, "{}", self.selector),
        }
    }
}

/// One browser session's navigation, interaction and observation primitives.
///
/// Observation methods must not fail just because nothing matches:
/// `is_visible` is `false` and `count` is `0` for a missing element.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    async fn navigate_to(&self, url: &str) -> FlowResult<()>;

    async fn current_url(&self) -> FlowResult<String>;

    /// Resolve a selector into an element reference. Lazy by default.
    fn locate(&self, selector: Selector) -> ElementRef {
        ElementRef::new(selector)
    }

    async fn click(&self, element: &ElementRef) -> FlowResult<()>;

    async fn fill(&self, element: &ElementRef, text: &str) -> FlowResult<()>;

    async fn is_visible(&self, element: &ElementRef) -> FlowResult<bool>;

    async fn text_content(&self, element: &ElementRef) -> FlowResult<String>;

    /// Number of elements currently matching the reference
    async fn count(&self, element: &ElementRef) -> FlowResult<usize>;
}

pub type SharedSession = Arc<dyn SessionHandle>;

/// A primitive step inside a recovery action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Navigate { url: String },
    Click { target: ElementRef },
    Fill { target: ElementRef, value: String },
}

impl Step {
    pub fn navigate(url: impl Into<String>) -> Self {
        Step::Navigate { url: url.into() }
    }

    pub fn click(target: impl Into<ElementRef>) -> Self {
        Step::Click {
            target: target.into(),
        }
    }

    pub fn fill(target: impl Into<ElementRef>, value: impl Into<String>) -> Self {
        Step::Fill {
            target: target.into(),
            value: value.into(),
        }
    }

    /// Execute this step against a session
    pub async fn perform(&self, session: &dyn SessionHandle) -> FlowResult<()> {
        debug!("Performing step: {}", self);
        match self {
            Step::Navigate { url } => session.navigate_to(url).await,
            Step::Click { target } => session.click(target).await,
            Step::Fill { target, value } => session.fill(target, value).await,
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Navigate { url } => write!(f, "navigate:{}", url),
            Step::Click { target } => write!(f, "click:{}", target),
            Step::Fill { target, .. } => write!(f, "fill:{}", target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_serde_shape() {
        let json = serde_json::to_value(Selector::button("Login")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "by": "role", "role": "button", "name": "Login" })
        );

        let el: ElementRef =
            serde_json::from_str(r#"{"selector":{"by":"css","css":".cart_item"},"nth":0}"#).unwrap();
        assert_eq!(el, ElementRef::new(Selector::css(".cart_item")).first());
    }

    #[test]
    fn test_step_display_hides_fill_values() {
        let step = Step::fill(Selector::placeholder("Password"), "secret_sauce");
        assert_eq!(step.to_string(), "fill:placeholder=\"Password\"");
    }
}
