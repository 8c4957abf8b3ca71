//! [`ExclusiveSelector`] – "exactly one robot holds this flag".
//!
//! The same algorithm guards two independent domains: which robot receives
//! teleop commands ([`SelectionFlag::Control`]) and which robot's camera is
//! on screen ([`SelectionFlag::View`]).  A selection in one domain never
//! touches the other.

use std::fmt;

use cnr_types::PanelError;
use serde::Serialize;
use tracing::info;

use crate::registry::{Robot, RobotRegistry};

/// The per-robot boolean a selector is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionFlag {
    /// `has_control`: the robot teleop commands are routed to.
    Control,
    /// `has_view`: the robot whose video feed is displayed.
    View,
}

impl fmt::Display for SelectionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionFlag::Control => write!(f, "control"),
            SelectionFlag::View => write!(f, "view"),
        }
    }
}

/// Exclusive selection over one [`SelectionFlag`] of a [`RobotRegistry`].
///
/// # Example
///
/// ```
/// use cnr_core::registry::RobotRegistry;
/// use cnr_core::selector::ExclusiveSelector;
///
/// let mut registry = RobotRegistry::from_names(["Deckard", "Roy", "Pris"]).unwrap();
/// let control = ExclusiveSelector::CONTROL;
///
/// control.select(&mut registry, "Pris").unwrap();
/// control.select(&mut registry, "Roy").unwrap();
///
/// assert_eq!(control.selected(&registry).unwrap().name(), "Roy");
/// assert!(!registry.get("Pris").unwrap().has_control());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusiveSelector {
    flag: SelectionFlag,
}

impl ExclusiveSelector {
    /// Selector for the teleop control target.
    pub const CONTROL: Self = Self::new(SelectionFlag::Control);
    /// Selector for the displayed video feed.
    pub const VIEW: Self = Self::new(SelectionFlag::View);

    pub const fn new(flag: SelectionFlag) -> Self {
        Self { flag }
    }

    pub fn flag(&self) -> SelectionFlag {
        self.flag
    }

    /// Flag `target` and clear the flag on every other robot.
    ///
    /// The lookup happens before any write, so an unknown `target` leaves
    /// every flag exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::NotFound`] if `target` is not registered.
    pub fn select<'a>(&self, registry: &'a mut RobotRegistry, target: &str) -> Result<&'a Robot, PanelError> {
        let chosen = registry
            .position(target)
            .ok_or_else(|| PanelError::robot_not_found(target))?;

        for (i, robot) in registry.robots_mut().iter_mut().enumerate() {
            robot.set_flag(self.flag, i == chosen);
        }
        info!(flag = %self.flag, robot = target, "selection changed");
        Ok(&registry.list()[chosen])
    }

    /// The robot currently holding this flag, if any.
    pub fn selected<'a>(&self, registry: &'a RobotRegistry) -> Option<&'a Robot> {
        registry.list().iter().find(|robot| robot.flag(self.flag))
    }
}
