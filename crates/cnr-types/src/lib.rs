use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Topic that carries encoded human observations to the perception pipeline.
pub const HUMAN_SENSOR_TOPIC: &str = "/human_sensor";

/// Prefix of the per-robot raw command topics (`/robot_command/{name}`).
pub const ROBOT_COMMAND_PREFIX: &str = "/robot_command/";

/// Build the raw command topic for `robot`.
pub fn robot_command_topic(robot: &str) -> String {
    format!("{ROBOT_COMMAND_PREFIX}{robot}")
}

/// Unified event wrapper for the panel event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "cnr-core::panel"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Which stream of a backend process a captured line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Variants of data that can be routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// An opaque payload leaving the panel on a pub/sub topic.
    Publish { topic: String, data: String },
    /// Teleop commands are now routed to `robot`.
    ControlChanged { robot: String },
    /// The displayed video feed now shows `robot`.
    ViewChanged { robot: String, stream_url: String },
    /// The operator switched observation category tabs.
    TabChanged { category: String },
    /// A robot's active flag was toggled.
    ActiveChanged { robot: String, active: bool },
    /// A field of an observation category changed.
    FieldChanged {
        category: String,
        field: String,
        value: String,
    },
    /// An observation sentence was published.
    ObservationSubmitted { message: String },
    /// The Vicon/Gazebo toggle moved.
    SourceChanged { source: String },
    /// The simulation/motion-capture backend was launched.
    BackendStarted { mode: String },
    /// One captured line of backend output.
    BackendOutput {
        mode: String,
        stream: OutputStream,
        line: String,
    },
    /// The backend process exited (`code` is `None` when killed by a signal).
    BackendExited { mode: String, code: Option<i32> },
}

/// Global error type spanning selection lookups, registry setup, transport
/// and backend failures.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanelError {
    #[error("{kind} '{name}' is not registered")]
    NotFound { kind: String, name: String },

    #[error("Duplicate name: '{0}' is already registered")]
    DuplicateName(String),

    #[error("Invalid option '{value}' for field {field}")]
    InvalidOption { field: String, value: String },

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Backend Error: {0}")]
    Backend(String),

    #[error("Config Error: {0}")]
    Config(String),
}

impl PanelError {
    /// Shorthand for a [`PanelError::NotFound`] on a robot name.
    pub fn robot_not_found(name: &str) -> Self {
        Self::NotFound {
            kind: "robot".to_string(),
            name: name.to_string(),
        }
    }
}
