//! Action Wrapper
//!
//! Entry point for page-level code. Each call looks up the element's
//! references, runs the action through the [`HealingEngine`] and turns a
//! terminal failure into a [`RemendarError`]. Nothing below this layer
//! raises.
//!
//! # Example
//!
//! ```ignore
//! let page = HealingPage::new(driver, engine)
//!     .with_seed("loginButton", "#login-btn");
//!
//! page.fill("username", "alice").await?;
//! let report = page.click("loginButton").await?;
//! if report.was_healed() {
//!     println!("healed to {}", report.reference);
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::driver::{Action, HealingDriver};
use crate::engine::{ActionOutcome, HealingEngine, HealingResult, ResolvedVia};
use crate::reference::ReferenceEntry;
use crate::result::{RemendarError, RemendarResult};

/// What happened when an action succeeded
#[derive(Debug, Clone, PartialEq)]
pub struct ActionReport {
    /// Element key
    pub key: String,
    /// Reference the action ran against
    pub reference: String,
    /// How the reference was found
    pub via: ResolvedVia,
    /// AI healing details, when that path ran
    pub healing: Option<HealingResult>,
}

impl ActionReport {
    /// Resolved by anything other than the stored primary
    #[must_use]
    pub const fn was_healed(&self) -> bool {
        !matches!(self.via, ResolvedVia::Primary)
    }
}

/// One worker's page, with healing around every action
pub struct HealingPage {
    driver: Arc<dyn HealingDriver>,
    engine: Arc<HealingEngine>,
    seeds: HashMap<String, String>,
}

impl std::fmt::Debug for HealingPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealingPage")
            .field("engine", &self.engine)
            .field("seeds", &self.seeds)
            .finish()
    }
}

impl HealingPage {
    /// Create a page over `driver`
    #[must_use]
    pub fn new(driver: Arc<dyn HealingDriver>, engine: Arc<HealingEngine>) -> Self {
        Self {
            driver,
            engine,
            seeds: HashMap::new(),
        }
    }

    /// Reference to use for `key` when the store has no entry
    #[must_use]
    pub fn with_seed(mut self, key: impl Into<String>, reference: impl Into<String>) -> Self {
        let _ = self.seeds.insert(key.into(), reference.into());
        self
    }

    /// Underlying engine
    #[must_use]
    pub fn engine(&self) -> &Arc<HealingEngine> {
        &self.engine
    }

    /// Stored entry for `key`, else one built from its seed
    fn entry(&self, key: &str) -> RemendarResult<ReferenceEntry> {
        if let Some(entry) = self.engine.store().lookup(key) {
            return Ok(entry);
        }
        self.seeds
            .get(key)
            .map(|seed| ReferenceEntry::new(key, seed.as_str()))
            .ok_or_else(|| RemendarError::UnknownElement {
                key: key.to_string(),
            })
    }

    /// Perform `action` on the element `key`
    pub async fn perform(&self, key: &str, action: Action) -> RemendarResult<ActionReport> {
        let entry = self.entry(key)?;
        match self.engine.execute(self.driver.as_ref(), &entry, &action).await {
            ActionOutcome::Completed {
                reference,
                via,
                healing,
            } => Ok(ActionReport {
                key: key.to_string(),
                reference,
                via,
                healing,
            }),
            ActionOutcome::Failed { failure, healing } => Err(RemendarError::ElementNotResolved {
                key: key.to_string(),
                failure,
                healing: healing.map(Box::new),
            }),
        }
    }

    /// Click `key`
    pub async fn click(&self, key: &str) -> RemendarResult<ActionReport> {
        self.perform(key, Action::Click).await
    }

    /// Type `value` into `key`
    pub async fn fill(&self, key: &str, value: impl Into<String>) -> RemendarResult<ActionReport> {
        self.perform(key, Action::Fill(value.into())).await
    }

    /// Choose `option` in `key`
    pub async fn select(
        &self,
        key: &str,
        option: impl Into<String>,
    ) -> RemendarResult<ActionReport> {
        self.perform(key, Action::Select(option.into())).await
    }

    /// Tick `key`
    pub async fn check(&self, key: &str) -> RemendarResult<ActionReport> {
        self.perform(key, Action::Check).await
    }

    /// Hover over `key`
    pub async fn hover(&self, key: &str) -> RemendarResult<ActionReport> {
        self.perform(key, Action::Hover).await
    }

    /// Wait until `key` is present
    pub async fn wait_for(&self, key: &str) -> RemendarResult<ActionReport> {
        self.perform(key, Action::Wait).await
    }
}
