//! [`PanelDriver`] – the single task that owns the [`ControlPanel`].
//!
//! Browser tabs and the terminal REPL all talk to the panel concurrently,
//! but the panel itself is a plain synchronous state machine.  Every
//! operator action is therefore sent as a [`PanelCommand`] through an mpsc
//! channel and applied by one task, one command at a time, in arrival order.
//! Each caller gets the resulting [`CockpitState`] (or the error) back on a
//! oneshot channel.

use std::sync::Arc;

use cnr_core::{ControlPanel, Field, PanelSnapshot};
use cnr_middleware::{EventBus, Topic};
use cnr_types::{Event, EventPayload, PanelError};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::backend::{BackendLauncher, DataSource};
use crate::video::{MAIN_VIEW_SLOT, StreamResolver};

const SOURCE: &str = "cnr-cockpit::driver";

/// Number of commands that may queue up before senders wait.
const COMMAND_QUEUE: usize = 64;

/// One discrete operator action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCommand {
    /// Report the current state without changing anything.
    Snapshot,
    SelectControl(String),
    SelectView(String),
    SetActive { robot: String, active: bool },
    SelectTab(String),
    SetField { field: String, value: String },
    SubmitObservation,
    /// Raw teleop payload for the controlled robot.
    Command(String),
    SelectSource(String),
    StartBackend,
    StopBackend,
}

/// Everything a UI client needs to render the panel.
#[derive(Debug, Clone, Serialize)]
pub struct CockpitState {
    #[serde(flatten)]
    pub panel: PanelSnapshot,
    pub view_url: Option<String>,
    pub source: DataSource,
    pub backend_running: bool,
    pub last_observation: Option<String>,
}

type Reply = oneshot::Sender<Result<CockpitState, PanelError>>;

/// Cloneable sender side of the driver.
#[derive(Clone)]
pub struct PanelHandle {
    tx: mpsc::Sender<(PanelCommand, Reply)>,
}

impl PanelHandle {
    /// Queue `command` and wait for its result.
    ///
    /// # Errors
    ///
    /// The command's own [`PanelError`], or [`PanelError::Channel`] if the
    /// driver has stopped.
    pub async fn apply(&self, command: PanelCommand) -> Result<CockpitState, PanelError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((command, reply_tx))
            .await
            .map_err(|_| PanelError::Channel("panel driver stopped".to_string()))?;
        reply_rx
            .await
            .map_err(|_| PanelError::Channel("panel driver dropped the reply".to_string()))?
    }

    /// Blocking variant of [`PanelHandle::apply`] for non-async threads.
    ///
    /// Must not be called from inside a Tokio runtime.
    pub fn blocking_apply(&self, command: PanelCommand) -> Result<CockpitState, PanelError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .blocking_send((command, reply_tx))
            .map_err(|_| PanelError::Channel("panel driver stopped".to_string()))?;
        reply_rx
            .blocking_recv()
            .map_err(|_| PanelError::Channel("panel driver dropped the reply".to_string()))?
    }
}

/// Owns the [`ControlPanel`] and the backend, applying commands in order.
pub struct PanelDriver {
    panel: ControlPanel,
    bus: Arc<EventBus>,
    resolver: Box<dyn StreamResolver>,
    backend: BackendLauncher,
    source: DataSource,
    last_observation: Option<String>,
    rx: mpsc::Receiver<(PanelCommand, Reply)>,
}

impl PanelDriver {
    /// Build the driver and the handle used to reach it.
    pub fn new(
        panel: ControlPanel,
        bus: Arc<EventBus>,
        resolver: Box<dyn StreamResolver>,
        backend: BackendLauncher,
    ) -> (Self, PanelHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let driver = Self {
            panel,
            bus,
            resolver,
            backend,
            source: DataSource::default(),
            last_observation: None,
            rx,
        };
        (driver, PanelHandle { tx })
    }

    /// Process commands until every [`PanelHandle`] has been dropped.
    pub async fn run(mut self) {
        info!("panel driver running");
        while let Some((command, reply)) = self.rx.recv().await {
            debug!(?command, "panel command");
            let result = self.handle(command).await;
            if let Err(e) = &result {
                warn!(error = %e, "panel command rejected");
            }
            // The caller may have given up waiting; nothing to do then.
            let _ = reply.send(result);
        }
        self.backend.stop().await;
        info!("panel driver stopped");
    }

    pub(crate) async fn handle(&mut self, command: PanelCommand) -> Result<CockpitState, PanelError> {
        match command {
            PanelCommand::Snapshot => {}
            PanelCommand::SelectControl(name) => {
                let robot = self.panel.select_control(&name)?.name().to_string();
                self.emit(EventPayload::ControlChanged { robot });
            }
            PanelCommand::SelectView(name) => {
                let robot = self.panel.select_view(&name)?.name().to_string();
                let stream_url = self.resolver.stream_url(&robot, MAIN_VIEW_SLOT);
                self.emit(EventPayload::ViewChanged { robot, stream_url });
            }
            PanelCommand::SetActive { robot, active } => {
                self.panel.set_active(&robot, active)?;
                self.emit(EventPayload::ActiveChanged { robot, active });
            }
            PanelCommand::SelectTab(name) => {
                let kind = self.panel.select_tab(&name)?;
                self.emit(EventPayload::TabChanged {
                    category: kind.to_string(),
                });
            }
            PanelCommand::SetField { field, value } => {
                let field = field.parse::<Field>()?;
                self.panel.set_field(field, &value)?;
                self.emit(EventPayload::FieldChanged {
                    category: self.panel.tabs().active().to_string(),
                    field: field.to_string(),
                    value,
                });
            }
            PanelCommand::SubmitObservation => {
                let message = self.panel.submit_observation();
                self.last_observation = Some(message.clone());
                self.emit(EventPayload::ObservationSubmitted { message });
            }
            PanelCommand::Command(payload) => {
                self.panel.send_command(&payload)?;
            }
            PanelCommand::SelectSource(name) => {
                self.source = name.parse()?;
                info!(source = %self.source, "data source selected");
                self.emit(EventPayload::SourceChanged {
                    source: self.source.to_string(),
                });
            }
            PanelCommand::StartBackend => {
                self.backend.start(self.source).await?;
            }
            PanelCommand::StopBackend => {
                if !self.backend.stop().await {
                    debug!("no backend running");
                }
            }
        }
        Ok(self.state())
    }

    fn state(&self) -> CockpitState {
        CockpitState {
            panel: self.panel.snapshot(),
            view_url: self
                .panel
                .viewed()
                .map(|robot| self.resolver.stream_url(robot.name(), MAIN_VIEW_SLOT)),
            source: self.source,
            backend_running: self.backend.is_running(),
            last_observation: self.last_observation.clone(),
        }
    }

    fn emit(&self, payload: EventPayload) {
        self.bus.emit(Topic::PanelState, Event::new(SOURCE, payload));
    }
}
