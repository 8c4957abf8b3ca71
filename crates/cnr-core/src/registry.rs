//! [`RobotRegistry`] – the fixed set of robots the panel can drive.
//!
//! Robots are registered once at startup and live for the lifetime of the
//! process.  There is no removal; only their flags change afterwards.  The
//! `has_control` and `has_view` flags are written exclusively by
//! [`ExclusiveSelector`][crate::selector::ExclusiveSelector] so the
//! "exactly one" invariant is enforced in a single place.

use std::collections::HashMap;

use cnr_types::{PanelError, robot_command_topic};
use serde::Serialize;

use crate::selector::SelectionFlag;

/// One teleoperable robot and its panel flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Robot {
    name: String,
    display_name: String,
    is_active: bool,
    has_control: bool,
    has_view: bool,
    command_topic: String,
}

impl Robot {
    /// A robot whose display name equals its `name`.  Starts active, with
    /// neither control nor view.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            command_topic: robot_command_topic(&name),
            name,
            is_active: true,
            has_control: false,
            has_view: false,
        }
    }

    /// Override the human-readable label (builder-style).
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Operator-enabled flag.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn has_control(&self) -> bool {
        self.has_control
    }

    pub fn has_view(&self) -> bool {
        self.has_view
    }

    /// Outbound topic for raw commands, `/robot_command/{name}`.
    pub fn command_topic(&self) -> &str {
        &self.command_topic
    }

    pub(crate) fn flag(&self, flag: SelectionFlag) -> bool {
        match flag {
            SelectionFlag::Control => self.has_control,
            SelectionFlag::View => self.has_view,
        }
    }

    pub(crate) fn set_flag(&mut self, flag: SelectionFlag, value: bool) {
        match flag {
            SelectionFlag::Control => self.has_control = value,
            SelectionFlag::View => self.has_view = value,
        }
    }
}

/// Ordered registry of [`Robot`]s keyed by name.
///
/// # Example
///
/// ```
/// use cnr_core::registry::{Robot, RobotRegistry};
///
/// let mut registry = RobotRegistry::new();
/// registry.register(Robot::new("Deckard")).unwrap();
/// registry.register(Robot::new("Roy")).unwrap();
///
/// assert!(registry.register(Robot::new("Roy")).is_err());
/// assert_eq!(registry.get("Roy").unwrap().command_topic(), "/robot_command/Roy");
/// ```
#[derive(Debug, Default, Clone)]
pub struct RobotRegistry {
    robots: Vec<Robot>,
    index: HashMap<String, usize>,
}

impl RobotRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a static name list, in order.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::DuplicateName`] if a name repeats.
    pub fn from_names<I, S>(names: I) -> Result<Self, PanelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.register(Robot::new(name))?;
        }
        Ok(registry)
    }

    /// Add `robot` at the end of the registry.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::DuplicateName`] if a robot with the same name is
    /// already registered; the registry is left unchanged.
    pub fn register(&mut self, robot: Robot) -> Result<(), PanelError> {
        if self.index.contains_key(robot.name()) {
            return Err(PanelError::DuplicateName(robot.name().to_string()));
        }
        self.index.insert(robot.name().to_string(), self.robots.len());
        self.robots.push(robot);
        Ok(())
    }

    /// Look up a robot by name.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::NotFound`] if `name` is not registered.
    pub fn get(&self, name: &str) -> Result<&Robot, PanelError> {
        self.position(name)
            .map(|i| &self.robots[i])
            .ok_or_else(|| PanelError::robot_not_found(name))
    }

    /// All robots in registration order.
    pub fn list(&self) -> &[Robot] {
        &self.robots
    }

    pub fn len(&self) -> usize {
        self.robots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }

    /// Enable or disable `name` for the operator.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::NotFound`] if `name` is not registered.
    pub fn set_active(&mut self, name: &str, active: bool) -> Result<(), PanelError> {
        let i = self
            .position(name)
            .ok_or_else(|| PanelError::robot_not_found(name))?;
        self.robots[i].is_active = active;
        Ok(())
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn robots_mut(&mut self) -> &mut [Robot] {
        &mut self.robots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_get() {
        let mut registry = RobotRegistry::new();
        registry
            .register(Robot::new("Zhora").with_display_name("Zhora (pioneer)"))
            .unwrap();

        let robot = registry.get("Zhora").unwrap();
        assert_eq!(robot.name(), "Zhora");
        assert_eq!(robot.display_name(), "Zhora (pioneer)");
        assert!(robot.is_active());
        assert!(!robot.has_control());
        assert!(!robot.has_view());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = RobotRegistry::new();
        registry.register(Robot::new("Roy")).unwrap();
        let result = registry.register(Robot::new("Roy").with_display_name("other"));
        assert_eq!(result, Err(PanelError::DuplicateName("Roy".to_string())));
        // The original entry is untouched.
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Roy").unwrap().display_name(), "Roy");
    }

    #[test]
    fn get_unknown_returns_not_found() {
        let registry = RobotRegistry::from_names(["Deckard"]).unwrap();
        assert!(matches!(
            registry.get("Ghost"),
            Err(PanelError::NotFound { .. })
        ));
    }

    #[test]
    fn list_preserves_insertion_order() {
        let registry = RobotRegistry::from_names(["Deckard", "Roy", "Pris", "Zhora"]).unwrap();
        let names: Vec<&str> = registry.list().iter().map(Robot::name).collect();
        assert_eq!(names, ["Deckard", "Roy", "Pris", "Zhora"]);
    }

    #[test]
    fn from_names_rejects_duplicates() {
        let result = RobotRegistry::from_names(["Roy", "Pris", "Roy"]);
        assert!(matches!(result, Err(PanelError::DuplicateName(name)) if name == "Roy"));
    }

    #[test]
    fn set_active_toggles_operator_flag() {
        let mut registry = RobotRegistry::from_names(["Pris"]).unwrap();
        registry.set_active("Pris", false).unwrap();
        assert!(!registry.get("Pris").unwrap().is_active());
        assert!(registry.set_active("Ghost", true).is_err());
    }

    #[test]
    fn command_topic_follows_naming_convention() {
        let robot = Robot::new("Deckard");
        assert_eq!(robot.command_topic(), "/robot_command/Deckard");
    }
}
