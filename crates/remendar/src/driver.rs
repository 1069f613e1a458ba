//! HealingDriver - Abstract Browser Automation Seam
//!
//! The healing pipeline never talks to a browser directly. Everything it
//! needs from the automation driver goes through [`HealingDriver`]: attempt
//! an action against a reference, count matches, check actionability and
//! capture structural context for analysis.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  HealingDriver (Abstract Trait)                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────────────┐  ┌────────────────────┐  ┌────────┐  │
//! │  │  CDP / WebDriver   │  │  Playwright bridge │  │  Mock  │  │
//! │  │  adapter (user)    │  │  adapter (user)    │  │ Driver │  │
//! │  └────────────────────┘  └────────────────────┘  └────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every method is a suspension point (browser round-trip).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use crate::snapshot::{ElementContext, PageCapture};

/// Kind of UI action a reference is resolved for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Click the element
    Click,
    /// Type a value into the element
    Fill,
    /// Choose an option
    Select,
    /// Tick a checkbox or radio
    Check,
    /// Move the pointer over the element
    Hover,
    /// Wait until the element is present
    Wait,
}

impl ActionKind {
    /// Whether the action interacts with the element (as opposed to waiting for it)
    #[must_use]
    pub const fn is_interactive(self) -> bool {
        !matches!(self, Self::Wait)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Click => "click",
            Self::Fill => "fill",
            Self::Select => "select",
            Self::Check => "check",
            Self::Hover => "hover",
            Self::Wait => "wait",
        };
        f.write_str(name)
    }
}

/// A UI action together with its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Action {
    /// Click the element
    Click,
    /// Type `value` into the element
    Fill(String),
    /// Choose the option `value`
    Select(String),
    /// Tick a checkbox or radio
    Check,
    /// Move the pointer over the element
    Hover,
    /// Wait until the element is present
    Wait,
}

impl Action {
    /// The payload-free kind of this action
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Click => ActionKind::Click,
            Self::Fill(_) => ActionKind::Fill,
            Self::Select(_) => ActionKind::Select,
            Self::Check => ActionKind::Check,
            Self::Hover => ActionKind::Hover,
            Self::Wait => ActionKind::Wait,
        }
    }
}

/// Why a reference failed to resolve for an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionFailure {
    /// Zero elements matched
    NotFound,
    /// The element never became actionable in time
    Timeout,
    /// More than one element matched (strict-mode violation)
    Ambiguous,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("element not found"),
            Self::Timeout => f.write_str("timed out waiting for element"),
            Self::Ambiguous => f.write_str("reference matched more than one element"),
        }
    }
}

/// Abstract driver trait consumed by the healing pipeline
///
/// Implementations wrap a live page (one per worker). Methods take `&self`;
/// drivers that need mutation use interior mutability.
#[async_trait]
pub trait HealingDriver: Send + Sync {
    /// Perform `action` against the element `reference` resolves to
    async fn attempt(&self, reference: &str, action: &Action) -> Result<(), ResolutionFailure>;

    /// Number of elements `reference` currently resolves to
    async fn resolve_count(&self, reference: &str) -> usize;

    /// Whether the single element `reference` resolves to is visible and enabled
    async fn is_actionable(&self, reference: &str) -> bool;

    /// Structural description of the element last associated with `reference`
    async fn capture_context(&self, reference: Option<&str>) -> Option<ElementContext>;

    /// Title, URL and HTML of the current page
    async fn capture_page(&self) -> PageCapture;

    /// Elements structurally similar to `context` (same tag or role)
    async fn similar_elements(
        &self,
        context: Option<&ElementContext>,
        limit: usize,
    ) -> Vec<ElementContext> {
        let _ = (context, limit);
        Vec::new()
    }
}

/// Element on a [`MockDriver`] page
#[derive(Debug, Clone)]
pub struct MockElement {
    /// Reference expressions that resolve to this element
    pub references: Vec<String>,
    /// Structural description
    pub context: ElementContext,
    /// Element is visible
    pub visible: bool,
    /// Element is enabled
    pub enabled: bool,
}

impl MockElement {
    /// Create a visible, enabled element
    #[must_use]
    pub fn new(context: ElementContext) -> Self {
        Self {
            references: Vec::new(),
            context,
            visible: true,
            enabled: true,
        }
    }

    /// Add a reference that resolves to this element
    #[must_use]
    pub fn matching(mut self, reference: impl Into<String>) -> Self {
        self.references.push(reference.into());
        self
    }

    /// Mark the element hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark the element disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn matches(&self, reference: &str) -> bool {
        self.references.iter().any(|r| r == reference)
    }

    const fn is_actionable(&self) -> bool {
        self.visible && self.enabled
    }
}

/// Mock driver for unit testing
///
/// Models a page as a list of [`MockElement`]s, each listing the exact
/// reference strings that resolve to it.
#[derive(Debug, Default)]
pub struct MockDriver {
    page: PageCapture,
    elements: Vec<MockElement>,
    last_known: HashMap<String, ElementContext>,
    forced: HashMap<String, ResolutionFailure>,
    call_history: Mutex<Vec<String>>,
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page capture
    #[must_use]
    pub fn with_page(
        mut self,
        title: impl Into<String>,
        url: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        self.page = PageCapture {
            title: title.into(),
            url: url.into(),
            html: html.into(),
        };
        self
    }

    /// Add a mock element
    #[must_use]
    pub fn with_element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Remember `context` as the last known description of `reference`
    #[must_use]
    pub fn with_last_known(mut self, reference: impl Into<String>, context: ElementContext) -> Self {
        let _ = self.last_known.insert(reference.into(), context);
        self
    }

    /// Force `attempt` on `reference` to fail with `failure`
    #[must_use]
    pub fn with_failure(mut self, reference: impl Into<String>, failure: ResolutionFailure) -> Self {
        let _ = self.forced.insert(reference.into(), failure);
        self
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.call_history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Check if a call starting with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.history().iter().any(|c| c.starts_with(prefix))
    }

    /// Number of calls starting with `prefix`
    #[must_use]
    pub fn call_count(&self, prefix: &str) -> usize {
        self.history()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(call);
        }
    }

    fn matching(&self, reference: &str) -> Vec<&MockElement> {
        self.elements
            .iter()
            .filter(|e| e.matches(reference))
            .collect()
    }
}

#[async_trait]
impl HealingDriver for MockDriver {
    async fn attempt(&self, reference: &str, action: &Action) -> Result<(), ResolutionFailure> {
        self.record(format!("attempt:{}:{reference}", action.kind()));
        if let Some(failure) = self.forced.get(reference) {
            return Err(*failure);
        }
        match self.matching(reference).as_slice() {
            [] => Err(ResolutionFailure::NotFound),
            [element] => {
                if action.kind().is_interactive() && !element.is_actionable() {
                    Err(ResolutionFailure::Timeout)
                } else {
                    Ok(())
                }
            }
            _ => Err(ResolutionFailure::Ambiguous),
        }
    }

    async fn resolve_count(&self, reference: &str) -> usize {
        self.record(format!("resolve_count:{reference}"));
        self.matching(reference).len()
    }

    async fn is_actionable(&self, reference: &str) -> bool {
        self.record(format!("is_actionable:{reference}"));
        matches!(self.matching(reference).as_slice(), [e] if e.is_actionable())
    }

    async fn capture_context(&self, reference: Option<&str>) -> Option<ElementContext> {
        self.record(format!("capture_context:{}", reference.unwrap_or("")));
        let reference = reference?;
        self.last_known.get(reference).cloned().or_else(|| {
            match self.matching(reference).as_slice() {
                [e] => Some(e.context.clone()),
                _ => None,
            }
        })
    }

    async fn capture_page(&self) -> PageCapture {
        self.record("capture_page".to_string());
        self.page.clone()
    }

    async fn similar_elements(
        &self,
        context: Option<&ElementContext>,
        limit: usize,
    ) -> Vec<ElementContext> {
        self.record("similar_elements".to_string());
        let Some(target) = context else {
            return Vec::new();
        };
        self.elements
            .iter()
            .map(|e| &e.context)
            .filter(|c| {
                c.tag_name == target.tag_name || (c.role.is_some() && c.role == target.role)
            })
            .take(limit)
            .cloned()
            .collect()
    }
}
