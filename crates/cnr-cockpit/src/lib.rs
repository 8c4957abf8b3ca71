//! `cnr-cockpit` – The Teleop Control Panel Server
//!
//! Boots a lightweight HTTP + WebSocket server (default port `8080`) that:
//!
//! 1. **Serves** the embedded control panel page at every non-WebSocket
//!    HTTP path.
//!
//! 2. **Applies** operator frames from the browser (robot buttons, category
//!    tabs, observation fields, teleop keys, source toggles) through a
//!    [`PanelHandle`] to the single [`PanelDriver`] task that owns the
//!    [`ControlPanel`][cnr_core::ControlPanel], replying with the new
//!    [`CockpitState`].
//!
//! 3. **Streams** every [`EventBus`][cnr_middleware::EventBus] event
//!    (published commands and observations, selection changes, backend
//!    output) to every connected browser tab.
//!
//! # Modules
//!
//! - [`driver`] – [`PanelDriver`] / [`PanelHandle`]: serialized access to
//!   the panel.
//! - [`server`] – [`CockpitServer`]: HTTP + WebSocket front end.
//! - [`video`] – [`StreamResolver`][video::StreamResolver]: robot camera
//!   stream URLs.
//! - [`backend`] – [`BackendLauncher`][backend::BackendLauncher]: starts the
//!   Vicon or Gazebo backend and captures its output.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cnr_cockpit::{BackendLauncher, CockpitServer, PanelDriver, WebVideoServer};
//! use cnr_core::ControlPanel;
//! use cnr_middleware::EventBus;
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = Arc::new(EventBus::default());
//!     let panel = ControlPanel::from_names(["Deckard", "Roy"], "Deckard", bus.clone())
//!         .expect("robot list");
//!     let (driver, handle) = PanelDriver::new(
//!         panel,
//!         Arc::clone(&bus),
//!         Box::new(WebVideoServer::new("http://localhost:8081")),
//!         BackendLauncher::new(vec!["sh".into(), "scripts/backend.sh".into()], Arc::clone(&bus)),
//!     );
//!     tokio::spawn(driver.run());
//!     CockpitServer::new(handle, bus)
//!         .run()
//!         .await
//!         .expect("cockpit server failed");
//! }
//! ```

pub mod backend;
pub mod driver;
pub mod server;
pub mod video;

pub use backend::{BackendLauncher, DataSource};
pub use driver::{CockpitState, PanelCommand, PanelDriver, PanelHandle};
pub use server::{CockpitServer, DEFAULT_COMMAND_RATE, DEFAULT_PORT};
pub use video::{StreamResolver, WebVideoServer};
