//! `cnr-core` – Selection & Observation Engine
//!
//! The part of the control panel with real logic.  It does not render
//! anything and does not know about sockets; it keeps the selection state
//! consistent and turns operator input into payloads.
//!
//! # Modules
//!
//! - [`registry`] – [`RobotRegistry`][registry::RobotRegistry]: the fixed,
//!   ordered set of robots and their per-robot flags.
//! - [`selector`] – [`ExclusiveSelector`][selector::ExclusiveSelector]:
//!   "exactly one robot holds this flag", applied independently to teleop
//!   control and to the displayed video feed.
//! - [`observation`] – the cascading-field grammar for human observations
//!   and the pure [`encode`][observation::encode] function.
//! - [`tabs`] – [`CategoryTabs`][tabs::CategoryTabs]: the active
//!   observation category plus the persisted fields of every category.
//! - [`panel`] – [`ControlPanel`][panel::ControlPanel]: routes operator
//!   events through the above and publishes the results on a
//!   [`MessageChannel`][cnr_middleware::MessageChannel].

pub mod observation;
pub mod panel;
pub mod registry;
pub mod selector;
pub mod tabs;

pub use observation::{CategoryKind, Field, FieldVisibility, SelectionCategory, encode, visibility};
pub use panel::{ControlPanel, PanelSnapshot};
pub use registry::{Robot, RobotRegistry};
pub use selector::{ExclusiveSelector, SelectionFlag};
pub use tabs::CategoryTabs;
