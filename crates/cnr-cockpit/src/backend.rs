//! Simulation / motion-capture backend control.
//!
//! The panel can run against the Vicon motion-capture lab or a Gazebo
//! simulation.  The two source toggles are mutually exclusive; the active
//! one decides the mode token the backend command is launched with.
//!
//! Output of the backend is captured line by line for diagnostics only: it
//! is logged and mirrored onto the bus, never interpreted.

use std::fmt;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cnr_middleware::{EventBus, Topic};
use cnr_types::{Event, EventPayload, OutputStream, PanelError};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{info, warn};

const SOURCE: &str = "cnr-cockpit::backend";

/// Where robot poses come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[default]
    Vicon,
    Gazebo,
}

impl DataSource {
    /// The single argument passed to the backend command.
    pub fn mode_token(self) -> &'static str {
        match self {
            DataSource::Vicon => "vicon",
            DataSource::Gazebo => "gazebo",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode_token())
    }
}

impl FromStr for DataSource {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vicon" => Ok(DataSource::Vicon),
            "gazebo" => Ok(DataSource::Gazebo),
            _ => Err(PanelError::NotFound {
                kind: "data source".to_string(),
                name: s.to_string(),
            }),
        }
    }
}

/// Launches and stops the backend process.
///
/// The command is `program args... <mode>`, e.g. `sh scripts/backend.sh gazebo`.
/// At most one backend runs at a time; starting a new one stops the old.
pub struct BackendLauncher {
    command: Vec<String>,
    bus: Arc<EventBus>,
    running: Arc<AtomicBool>,
    pid: Option<u32>,
    /// Carries the sender the waiter acknowledges on once the child is reaped.
    kill_tx: Option<oneshot::Sender<oneshot::Sender<()>>>,
}

impl BackendLauncher {
    /// `command` is the program followed by its fixed arguments.
    pub fn new(command: Vec<String>, bus: Arc<EventBus>) -> Self {
        Self {
            command,
            bus,
            running: Arc::new(AtomicBool::new(false)),
            pid: None,
            kill_tx: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// OS process id of the most recently launched backend.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Start the backend for `source`.  Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::Backend`] when the command is empty or cannot be
    /// spawned.
    pub async fn start(&mut self, source: DataSource) -> Result<(), PanelError> {
        let (program, args) = match self.command.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => return Err(PanelError::Backend("no backend command configured".to_string())),
        };

        self.stop().await;

        let mode = source.mode_token();
        let mut child = Command::new(&program)
            .args(&args)
            .arg(mode)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PanelError::Backend(format!("failed to launch {program}: {e}")))?;

        self.pid = child.id();
        info!(program = %program, mode, pid = ?self.pid, "backend started");
        // Fresh flag per launch so a previous waiter cannot clear it.
        self.running = Arc::new(AtomicBool::new(true));
        self.bus.emit(
            Topic::PanelState,
            Event::new(SOURCE, EventPayload::BackendStarted { mode: mode.to_string() }),
        );

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_lines(stdout, OutputStream::Stdout, mode, Arc::clone(&self.bus)));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_lines(stderr, OutputStream::Stderr, mode, Arc::clone(&self.bus)));
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        self.kill_tx = Some(kill_tx);
        let running = Arc::clone(&self.running);
        let bus = Arc::clone(&self.bus);
        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => Ok(status),
                Ok(ack) = kill_rx => Err(ack),
            };
            let (status, ack) = match exited {
                Ok(status) => (status, None),
                Err(ack) => {
                    // `kill` also reaps the child.
                    if let Err(e) = child.kill().await {
                        warn!(mode, error = %e, "failed to kill backend");
                    }
                    (child.wait().await, Some(ack))
                }
            };
            running.store(false, Ordering::SeqCst);
            let code = status.ok().and_then(|s| s.code());
            info!(mode, ?code, "backend exited");
            bus.emit(
                Topic::PanelState,
                Event::new(SOURCE, EventPayload::BackendExited { mode: mode.to_string(), code }),
            );
            if let Some(ack) = ack {
                let _ = ack.send(());
            }
        });

        Ok(())
    }

    /// Kill the running backend and wait until it has been reaped.  Returns
    /// `false` when nothing was running, including a backend that already
    /// exited on its own.
    pub async fn stop(&mut self) -> bool {
        let Some(kill_tx) = self.kill_tx.take() else {
            return false;
        };
        if !self.is_running() {
            return false;
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        if kill_tx.send(ack_tx).is_err() {
            // The waiter already saw the process exit.
            return false;
        }
        ack_rx.await.is_ok()
    }
}

async fn pump_lines<R>(reader: R, stream: OutputStream, mode: &'static str, bus: Arc<EventBus>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                info!(mode, ?stream, line = %line, "backend output");
                bus.emit(
                    Topic::PanelState,
                    Event::new(
                        SOURCE,
                        EventPayload::BackendOutput {
                            mode: mode.to_string(),
                            stream,
                            line,
                        },
                    ),
                );
            }
            Ok(None) => break,
            Err(e) => {
                warn!(mode, ?stream, error = %e, "backend output read error");
                break;
            }
        }
    }
}
