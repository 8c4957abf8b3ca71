//! [`ControlPanel`] – routes operator events through the core.
//!
//! The panel owns the [`RobotRegistry`], the two [`ExclusiveSelector`]s
//! (control and view), the [`CategoryTabs`] and a [`MessageChannel`].  Every
//! method runs to completion synchronously; publishing is fire-and-forget.
//!
//! A default robot receives both control and view at construction, and the
//! Object tab is active, so there is never a moment without a command target
//! or an active category.

use std::sync::Arc;

use cnr_middleware::MessageChannel;
use cnr_types::{HUMAN_SENSOR_TOPIC, PanelError};
use serde::Serialize;
use tracing::{debug, info};

use crate::observation::{CategoryKind, Field, FieldVisibility, SelectionCategory, encode, options, visibility};
use crate::registry::{Robot, RobotRegistry};
use crate::selector::ExclusiveSelector;
use crate::tabs::CategoryTabs;

/// Operator-facing state machine of the teleop panel.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use cnr_core::ControlPanel;
/// use cnr_middleware::MemoryChannel;
///
/// let channel = Arc::new(MemoryChannel::new());
/// let mut panel = ControlPanel::from_names(["Deckard", "Roy"], "Deckard", channel.clone()).unwrap();
///
/// panel.select_control("Roy").unwrap();
/// panel.send_command("forward").unwrap();
///
/// assert_eq!(
///     channel.last(),
///     Some(("/robot_command/Roy".to_string(), "forward".to_string()))
/// );
/// ```
pub struct ControlPanel {
    registry: RobotRegistry,
    control: ExclusiveSelector,
    view: ExclusiveSelector,
    tabs: CategoryTabs,
    channel: Arc<dyn MessageChannel>,
}

impl ControlPanel {
    /// Wrap `registry`, giving `default_robot` both control and view.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::NotFound`] if `default_robot` is not registered.
    pub fn new(
        mut registry: RobotRegistry,
        default_robot: &str,
        channel: Arc<dyn MessageChannel>,
    ) -> Result<Self, PanelError> {
        let control = ExclusiveSelector::CONTROL;
        let view = ExclusiveSelector::VIEW;
        control.select(&mut registry, default_robot)?;
        view.select(&mut registry, default_robot)?;
        info!(robots = registry.len(), default_robot, "control panel ready");
        Ok(Self {
            registry,
            control,
            view,
            tabs: CategoryTabs::new(),
            channel,
        })
    }

    /// Build the registry from a static name list, then [`ControlPanel::new`].
    ///
    /// # Errors
    ///
    /// [`PanelError::DuplicateName`] for a repeated name,
    /// [`PanelError::NotFound`] for an unregistered `default_robot`.
    pub fn from_names<I, S>(
        names: I,
        default_robot: &str,
        channel: Arc<dyn MessageChannel>,
    ) -> Result<Self, PanelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(RobotRegistry::from_names(names)?, default_robot, channel)
    }

    pub fn registry(&self) -> &RobotRegistry {
        &self.registry
    }

    pub fn tabs(&self) -> &CategoryTabs {
        &self.tabs
    }

    // ------------------------------------------------------------------
    // Robot selection
    // ------------------------------------------------------------------

    /// Route subsequent commands to `name`.
    pub fn select_control(&mut self, name: &str) -> Result<&Robot, PanelError> {
        self.control.select(&mut self.registry, name)
    }

    /// Show `name`'s video feed.
    pub fn select_view(&mut self, name: &str) -> Result<&Robot, PanelError> {
        self.view.select(&mut self.registry, name)
    }

    /// The robot currently receiving commands.
    pub fn controlled(&self) -> Option<&Robot> {
        self.control.selected(&self.registry)
    }

    /// The robot whose feed is displayed.
    pub fn viewed(&self) -> Option<&Robot> {
        self.view.selected(&self.registry)
    }

    /// Enable or disable `name` for the operator.
    pub fn set_active(&mut self, name: &str, active: bool) -> Result<(), PanelError> {
        self.registry.set_active(name, active)?;
        info!(robot = name, active, "robot availability changed");
        Ok(())
    }

    /// Forward an opaque command payload to the controlled robot.
    ///
    /// Returns the topic the payload was published on.
    pub fn send_command(&self, payload: &str) -> Result<String, PanelError> {
        let robot = self.controlled().ok_or_else(|| PanelError::NotFound {
            kind: "control target".to_string(),
            name: String::new(),
        })?;
        let topic = robot.command_topic().to_string();
        debug!(robot = robot.name(), topic = %topic, "command");
        self.channel.publish(&topic, payload);
        Ok(topic)
    }

    // ------------------------------------------------------------------
    // Observations
    // ------------------------------------------------------------------

    /// Switch the active observation tab by name.
    pub fn select_tab(&mut self, name: &str) -> Result<CategoryKind, PanelError> {
        self.tabs.select_by_name(name)
    }

    /// Set `field` of the active category.
    pub fn set_field(&mut self, field: Field, value: &str) -> Result<(), PanelError> {
        self.tabs.set_field(field, value)
    }

    /// The message [`ControlPanel::submit_observation`] would publish now.
    pub fn preview_observation(&self) -> String {
        self.tabs.encode_active()
    }

    /// Encode the active category and publish it on `/human_sensor`.
    ///
    /// Returns the published message.
    pub fn submit_observation(&self) -> String {
        let message = self.tabs.encode_active();
        info!(category = %self.tabs.active(), message = %message, "observation submitted");
        self.channel.publish(HUMAN_SENSOR_TOPIC, &message);
        message
    }

    /// Serializable view of the whole panel state.
    pub fn snapshot(&self) -> PanelSnapshot {
        PanelSnapshot {
            robots: self.registry.list().to_vec(),
            control: self.controlled().map(|r| r.name().to_string()),
            view: self.viewed().map(|r| r.name().to_string()),
            active_tab: self.tabs.active(),
            categories: CategoryKind::ALL
                .into_iter()
                .map(|kind| {
                    let category = self.tabs.category(kind);
                    CategorySnapshot {
                        category: category.clone(),
                        options: Field::ALL.map(|field| options(kind, field)),
                        visibility: visibility(category),
                        message: encode(category),
                    }
                })
                .collect(),
        }
    }
}

/// Point-in-time copy of the panel state, sent to UI clients.
#[derive(Debug, Clone, Serialize)]
pub struct PanelSnapshot {
    pub robots: Vec<Robot>,
    pub control: Option<String>,
    pub view: Option<String>,
    pub active_tab: CategoryKind,
    pub categories: Vec<CategorySnapshot>,
}

/// One category's fields plus what the suppression rules make of them.
#[derive(Debug, Clone, Serialize)]
pub struct CategorySnapshot {
    #[serde(flatten)]
    pub category: SelectionCategory,
    /// Allowed values per field, in field order.
    pub options: [&'static [&'static str]; 5],
    pub visibility: FieldVisibility,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnr_middleware::MemoryChannel;

    fn make_panel() -> (Arc<MemoryChannel>, ControlPanel) {
        let channel = Arc::new(MemoryChannel::new());
        let panel =
            ControlPanel::from_names(["Deckard", "Roy", "Pris", "Zhora"], "Deckard", channel.clone()).unwrap();
        (channel, panel)
    }

    #[test]
    fn default_robot_holds_control_and_view() {
        let (_, panel) = make_panel();
        assert_eq!(panel.controlled().map(Robot::name), Some("Deckard"));
        assert_eq!(panel.viewed().map(Robot::name), Some("Deckard"));
        assert_eq!(panel.tabs().active(), CategoryKind::Object);
    }

    #[test]
    fn unknown_default_robot_is_rejected() {
        let channel = Arc::new(MemoryChannel::new());
        let result = ControlPanel::from_names(["Roy"], "Deckard", channel);
        assert!(matches!(result, Err(PanelError::NotFound { .. })));
    }

    #[test]
    fn duplicate_robot_names_are_fatal() {
        let channel = Arc::new(MemoryChannel::new());
        let result = ControlPanel::from_names(["Roy", "Roy"], "Roy", channel);
        assert!(matches!(result, Err(PanelError::DuplicateName(_))));
    }

    #[test]
    fn commands_follow_control_selection() {
        let (channel, mut panel) = make_panel();
        panel.send_command("forward").unwrap();
        panel.select_control("Pris").unwrap();
        panel.select_control("Roy").unwrap();
        let topic = panel.send_command("left").unwrap();

        assert_eq!(topic, "/robot_command/Roy");
        assert_eq!(
            channel.published(),
            vec![
                ("/robot_command/Deckard".to_string(), "forward".to_string()),
                ("/robot_command/Roy".to_string(), "left".to_string()),
            ]
        );
    }

    #[test]
    fn failed_control_selection_keeps_routing() {
        let (channel, mut panel) = make_panel();
        panel.select_control("Zhora").unwrap();
        assert!(panel.select_control("Ghost").is_err());

        panel.send_command("stop").unwrap();
        assert_eq!(channel.last().map(|(topic, _)| topic).as_deref(), Some("/robot_command/Zhora"));
    }

    #[test]
    fn view_selection_does_not_move_control() {
        let (_, mut panel) = make_panel();
        panel.select_view("Pris").unwrap();
        assert_eq!(panel.controlled().map(Robot::name), Some("Deckard"));
        assert_eq!(panel.viewed().map(Robot::name), Some("Pris"));
    }

    #[test]
    fn submit_publishes_on_human_sensor() {
        let (channel, mut panel) = make_panel();
        panel.set_field(Field::Target, "person").unwrap();
        panel.set_field(Field::Specification, "door").unwrap();

        let message = panel.submit_observation();

        assert_eq!(message, "Definitely person good near door .");
        assert_eq!(
            channel.last(),
            Some(("/human_sensor".to_string(), "Definitely person good near door .".to_string()))
        );
    }

    #[test]
    fn each_submission_publishes_once() {
        let (channel, panel) = make_panel();
        panel.submit_observation();
        panel.submit_observation();
        assert_eq!(channel.published().len(), 2);
    }

    #[test]
    fn preview_does_not_publish() {
        let (channel, panel) = make_panel();
        assert_eq!(panel.preview_observation(), "Definitely nothing  near .");
        assert!(channel.published().is_empty());
    }

    #[test]
    fn tab_switch_keeps_entries_for_submission() {
        let (channel, mut panel) = make_panel();
        panel.select_tab("Movement").unwrap();
        panel.set_field(Field::Target, "Roy").unwrap();
        panel.set_field(Field::Specification, "slowly").unwrap();
        panel.select_tab("Object").unwrap();
        panel.select_tab("Movement").unwrap();

        panel.submit_observation();
        assert_eq!(
            channel.last().map(|(_, data)| data).as_deref(),
            Some("Definitely Roy is moving slowly .")
        );
    }

    #[test]
    fn set_active_unknown_robot_fails() {
        let (_, mut panel) = make_panel();
        panel.set_active("Roy", false).unwrap();
        assert!(!panel.registry().get("Roy").unwrap().is_active());
        assert!(panel.set_active("Ghost", false).is_err());
    }

    #[test]
    fn snapshot_serializes_selection_state() {
        let (_, mut panel) = make_panel();
        panel.select_control("Roy").unwrap();
        panel.select_tab("area").unwrap();

        let snapshot = panel.snapshot();
        assert_eq!(snapshot.control.as_deref(), Some("Roy"));
        assert_eq!(snapshot.view.as_deref(), Some("Deckard"));
        assert_eq!(snapshot.active_tab, CategoryKind::Area);
        assert_eq!(snapshot.categories.len(), 3);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["active_tab"], "Area");
        assert_eq!(json["robots"][1]["name"], "Roy");
        assert_eq!(json["robots"][1]["has_control"], true);
        assert_eq!(json["categories"][0]["kind"], "Object");
        assert_eq!(json["categories"][0]["visibility"]["positivity"], false);
    }

    #[test]
    fn snapshot_carries_each_fields_options() {
        let (_, panel) = make_panel();
        let json = serde_json::to_value(panel.snapshot()).unwrap();

        let area = &json["categories"][1];
        assert_eq!(area["kind"], "Area");
        assert_eq!(area["options"][2], serde_json::json!(["is", "is not"]));
        assert_eq!(area["options"][4][0], "");
        assert_eq!(area["options"][4][1], "the kitchen");

        let movement = &json["categories"][2]["options"];
        assert_eq!(movement[3], serde_json::json!(["moving", "stopped"]));
        assert_eq!(movement.as_array().unwrap().len(), Field::ALL.len());
    }
}
