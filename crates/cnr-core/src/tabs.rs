//! [`CategoryTabs`] – the active observation category.
//!
//! Exactly one [`CategoryKind`] is active at a time (Object by default).
//! Each category keeps its own [`SelectionCategory`]; switching tabs never
//! resets any of them, so an operator can flip between tabs without losing
//! entries.

use cnr_types::PanelError;
use tracing::debug;

use crate::observation::{CategoryKind, Field, SelectionCategory, encode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTabs {
    active: CategoryKind,
    categories: [SelectionCategory; 3],
}

impl Default for CategoryTabs {
    fn default() -> Self {
        Self {
            active: CategoryKind::Object,
            categories: CategoryKind::ALL.map(SelectionCategory::new),
        }
    }
}

impl CategoryTabs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> CategoryKind {
        self.active
    }

    /// Make `kind` the active tab.
    pub fn select(&mut self, kind: CategoryKind) {
        if self.active != kind {
            debug!(from = %self.active, to = %kind, "tab switched");
        }
        self.active = kind;
    }

    /// Make the tab called `name` active (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::NotFound`] for an unknown tab name; the active
    /// tab is unchanged.
    pub fn select_by_name(&mut self, name: &str) -> Result<CategoryKind, PanelError> {
        let kind = name.parse::<CategoryKind>()?;
        self.select(kind);
        Ok(kind)
    }

    pub fn category(&self, kind: CategoryKind) -> &SelectionCategory {
        &self.categories[kind.index()]
    }

    pub fn active_category(&self) -> &SelectionCategory {
        self.category(self.active)
    }

    /// Set `field` on the active category.
    pub fn set_field(&mut self, field: Field, value: &str) -> Result<(), PanelError> {
        self.categories[self.active.index()].set(field, value)
    }

    /// Encode the active category.
    pub fn encode_active(&self) -> String {
        encode(self.active_category())
    }
}
