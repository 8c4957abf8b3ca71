//! [`CockpitServer`] – HTTP + WebSocket server for the control panel page.
//!
//! Listens on `0.0.0.0:8080` (configurable via [`CockpitServer::with_port`]).
//!
//! * Regular HTTP requests → 200 OK with the embedded panel HTML.
//! * WebSocket upgrades → operator frames go to the [`PanelHandle`]; every
//!   bus event streams back to the browser.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use cnr_middleware::EventBus;
use cnr_types::PanelError;
use futures_util::{SinkExt, StreamExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::driver::{CockpitState, PanelCommand, PanelHandle};

/// Default TCP port for the cockpit HTTP/WebSocket server.
pub const DEFAULT_PORT: u16 = 8080;

/// Default per-connection budget for `/panel/command` frames.
pub const DEFAULT_COMMAND_RATE: u32 = 20;

/// The compiled-in control panel page (HTML + CSS + JS).
const PANEL_HTML: &str = include_str!("panel.html");

// ---------------------------------------------------------------------------
// CockpitServer
// ---------------------------------------------------------------------------

/// Lightweight HTTP + WebSocket server that serves the panel page and
/// connects browsers to the panel driver and the [`EventBus`].
pub struct CockpitServer {
    handle: PanelHandle,
    bus: Arc<EventBus>,
    port: u16,
    command_rate: NonZeroU32,
}

impl CockpitServer {
    /// Create a server on the [`DEFAULT_PORT`].
    pub fn new(handle: PanelHandle, bus: Arc<EventBus>) -> Self {
        Self {
            handle,
            bus,
            port: DEFAULT_PORT,
            command_rate: NonZeroU32::new(DEFAULT_COMMAND_RATE).unwrap_or(NonZeroU32::MIN),
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the per-connection command rate (builder-style).  Zero is
    /// clamped to one command per second.
    pub fn with_command_rate(mut self, per_second: u32) -> Self {
        self.command_rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn command_rate(&self) -> u32 {
        self.command_rate.get()
    }

    /// Start the server.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::Channel`] if the TCP listener cannot bind.
    pub async fn run(self) -> Result<(), PanelError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| PanelError::Channel(format!("bind error on {addr}: {e}")))?;

        info!(port = self.port, "control panel listening on http://localhost:{}", self.port);

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let handle = self.handle.clone();
                    let bus = Arc::clone(&self.bus);
                    let rate = self.command_rate;
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, handle, bus, rate).await {
                            warn!(peer = %peer, error = %e, "client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-connection handler
// ---------------------------------------------------------------------------

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handle: PanelHandle,
    bus: Arc<EventBus>,
    rate: NonZeroU32,
) -> Result<(), PanelError> {
    // `peek` leaves the request in the socket for tungstenite's handshake.
    let mut buf = [0u8; 1024];
    let n = stream
        .peek(&mut buf)
        .await
        .map_err(|e| PanelError::Channel(format!("peek error from {peer}: {e}")))?;

    if is_websocket_upgrade(&String::from_utf8_lossy(&buf[..n])) {
        handle_ws(stream, peer, handle, bus, rate).await
    } else {
        serve_html(stream).await
    }
}

fn is_websocket_upgrade(request_head: &str) -> bool {
    request_head.lines().any(|line| {
        let line = line.to_lowercase();
        line.starts_with("upgrade:") && line.contains("websocket")
    })
}

async fn serve_html(mut stream: TcpStream) -> Result<(), PanelError> {
    let body = PANEL_HTML;
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        body.len(),
        body
    );
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| PanelError::Channel(format!("HTTP write error: {e}")))
}

async fn handle_ws(
    stream: TcpStream,
    peer: SocketAddr,
    handle: PanelHandle,
    bus: Arc<EventBus>,
    rate: NonZeroU32,
) -> Result<(), PanelError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| PanelError::Channel(format!("WS handshake from {peer}: {e}")))?;
    info!(peer = %peer, "panel client connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let mut bus_rx = bus.subscribe();
    let limiter = RateLimiter::direct(Quota::per_second(rate));

    // Greet the client with the current state so it can render immediately.
    let greeting = reply_frame(handle.apply(PanelCommand::Snapshot).await);
    if ws_tx.send(Message::Text(greeting.into())).await.is_err() {
        return Ok(());
    }

    loop {
        tokio::select! {
            // ── Downstream: EventBus → browser ─────────────────────────────
            result = bus_rx.recv() => {
                match result {
                    Ok(event) => {
                        let frame = json!({ "op": "event", "event": event }).to_string();
                        if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(peer = %peer, lagged_by = n, "panel client lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            // ── Upstream: browser → panel driver ────────────────────────────
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_upstream_message(text.as_str(), &handle, &limiter).await
                            && ws_tx.send(Message::Text(reply.into())).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    info!(peer = %peer, "panel client disconnected");
    Ok(())
}

// ---------------------------------------------------------------------------
// Upstream message handling
// ---------------------------------------------------------------------------

/// Apply one upstream frame and build the reply frame.
///
/// Returns `None` for frames that are ignored: unparseable or unknown
/// messages, and commands dropped by the rate limiter.
pub(crate) async fn handle_upstream_message(
    text: &str,
    handle: &PanelHandle,
    limiter: &DefaultDirectRateLimiter,
) -> Option<String> {
    let command = parse_upstream(text)?;
    if matches!(command, PanelCommand::Command(_)) && limiter.check().is_err() {
        debug!("teleop command dropped by rate limiter");
        return None;
    }
    Some(reply_frame(handle.apply(command).await))
}

/// Translate a browser frame into a [`PanelCommand`].
///
/// | Topic | `msg` fields | Command |
/// |---|---|---|
/// | `/panel/state` | – | [`PanelCommand::Snapshot`] |
/// | `/panel/control` | `robot` | [`PanelCommand::SelectControl`] |
/// | `/panel/view` | `robot` | [`PanelCommand::SelectView`] |
/// | `/panel/active` | `robot`, `active` | [`PanelCommand::SetActive`] |
/// | `/panel/tab` | `category` | [`PanelCommand::SelectTab`] |
/// | `/panel/field` | `field`, `value` | [`PanelCommand::SetField`] |
/// | `/panel/submit` | – | [`PanelCommand::SubmitObservation`] |
/// | `/panel/command` | `data` | [`PanelCommand::Command`] |
/// | `/panel/source` | `source` | [`PanelCommand::SelectSource`] |
/// | `/panel/backend/start` | – | [`PanelCommand::StartBackend`] |
/// | `/panel/backend/stop` | – | [`PanelCommand::StopBackend`] |
///
/// Anything else yields `None`.
pub(crate) fn parse_upstream(text: &str) -> Option<PanelCommand> {
    let json = serde_json::from_str::<Value>(text).ok()?;
    let topic = json.get("topic").and_then(Value::as_str)?;
    let msg = json.get("msg");
    let text_field = |key: &str| -> Option<String> {
        msg.and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let command = match topic {
        "/panel/state" => PanelCommand::Snapshot,
        "/panel/control" => PanelCommand::SelectControl(text_field("robot")?),
        "/panel/view" => PanelCommand::SelectView(text_field("robot")?),
        "/panel/active" => PanelCommand::SetActive {
            robot: text_field("robot")?,
            active: msg.and_then(|m| m.get("active")).and_then(Value::as_bool)?,
        },
        "/panel/tab" => PanelCommand::SelectTab(text_field("category")?),
        "/panel/field" => PanelCommand::SetField {
            field: text_field("field")?,
            value: text_field("value")?,
        },
        "/panel/submit" => PanelCommand::SubmitObservation,
        "/panel/command" => PanelCommand::Command(text_field("data")?),
        "/panel/source" => PanelCommand::SelectSource(text_field("source")?),
        "/panel/backend/start" => PanelCommand::StartBackend,
        "/panel/backend/stop" => PanelCommand::StopBackend,
        _ => return None,
    };
    Some(command)
}

fn reply_frame(result: Result<CockpitState, PanelError>) -> String {
    match result {
        Ok(state) => json!({ "op": "state", "state": state }).to_string(),
        Err(e) => json!({ "op": "error", "message": e.to_string() }).to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendLauncher;
    use crate::driver::PanelDriver;
    use crate::video::WebVideoServer;
    use cnr_core::ControlPanel;

    fn spawn_driver() -> (Arc<EventBus>, PanelHandle) {
        let bus = Arc::new(EventBus::default());
        let panel = ControlPanel::from_names(["Deckard", "Roy", "Pris", "Zhora"], "Deckard", bus.clone()).unwrap();
        let (driver, handle) = PanelDriver::new(
            panel,
            Arc::clone(&bus),
            Box::new(WebVideoServer::new("http://localhost:8081")),
            BackendLauncher::new(Vec::new(), Arc::clone(&bus)),
        );
        tokio::spawn(driver.run());
        (bus, handle)
    }

    fn limiter(per_second: u32) -> DefaultDirectRateLimiter {
        RateLimiter::direct(Quota::per_second(NonZeroU32::new(per_second).unwrap()))
    }

    // ── CockpitServer constructor ─────────────────────────────────────────────

    #[tokio::test]
    async fn default_port_and_rate() {
        let (bus, handle) = spawn_driver();
        let server = CockpitServer::new(handle, bus);
        assert_eq!(server.port(), DEFAULT_PORT);
        assert_eq!(server.command_rate(), DEFAULT_COMMAND_RATE);
    }

    #[tokio::test]
    async fn builder_overrides() {
        let (bus, handle) = spawn_driver();
        let server = CockpitServer::new(handle, bus).with_port(9999).with_command_rate(0);
        assert_eq!(server.port(), 9999);
        assert_eq!(server.command_rate(), 1);
    }

    // ── Frame parsing ─────────────────────────────────────────────────────────

    #[test]
    fn parse_known_topics() {
        assert_eq!(
            parse_upstream(r#"{"topic":"/panel/control","msg":{"robot":"Roy"}}"#),
            Some(PanelCommand::SelectControl("Roy".to_string()))
        );
        assert_eq!(
            parse_upstream(r#"{"topic":"/panel/active","msg":{"robot":"Pris","active":false}}"#),
            Some(PanelCommand::SetActive {
                robot: "Pris".to_string(),
                active: false
            })
        );
        assert_eq!(
            parse_upstream(r#"{"topic":"/panel/field","msg":{"field":"target","value":"person"}}"#),
            Some(PanelCommand::SetField {
                field: "target".to_string(),
                value: "person".to_string()
            })
        );
        assert_eq!(
            parse_upstream(r#"{"topic":"/panel/submit"}"#),
            Some(PanelCommand::SubmitObservation)
        );
        assert_eq!(
            parse_upstream(r#"{"topic":"/panel/backend/stop","msg":{}}"#),
            Some(PanelCommand::StopBackend)
        );
    }

    #[test]
    fn parse_rejects_unknown_or_incomplete_frames() {
        assert_eq!(parse_upstream("not json at all"), None);
        assert_eq!(parse_upstream(r#"{"op":"subscribe","topic":"/unknown"}"#), None);
        assert_eq!(parse_upstream(r#"{"topic":"/panel/control","msg":{}}"#), None);
        assert_eq!(parse_upstream(r#"{"topic":"/panel/active","msg":{"robot":"Roy"}}"#), None);
    }

    // ── Upstream handling ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn upstream_control_replies_with_state() {
        let (_, handle) = spawn_driver();
        let reply = handle_upstream_message(
            r#"{"topic":"/panel/control","msg":{"robot":"Roy"}}"#,
            &handle,
            &limiter(10),
        )
        .await
        .expect("known frame must get a reply");

        let json: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(json["op"], "state");
        assert_eq!(json["state"]["control"], "Roy");
        assert_eq!(json["state"]["source"], "vicon");
    }

    #[tokio::test]
    async fn upstream_unknown_robot_replies_with_error() {
        let (_, handle) = spawn_driver();
        let reply = handle_upstream_message(
            r#"{"topic":"/panel/view","msg":{"robot":"Ghost"}}"#,
            &handle,
            &limiter(10),
        )
        .await
        .unwrap();

        let json: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(json["op"], "error");
        assert!(json["message"].as_str().unwrap().contains("Ghost"));
    }

    #[tokio::test]
    async fn upstream_submit_publishes_observation() {
        let (bus, handle) = spawn_driver();
        let mut sensor = bus.subscribe_topic("/human_sensor");
        let limiter = limiter(10);

        for frame in [
            r#"{"topic":"/panel/field","msg":{"field":"target","value":"person"}}"#,
            r#"{"topic":"/panel/field","msg":{"field":"specification","value":"door"}}"#,
            r#"{"topic":"/panel/submit"}"#,
        ] {
            handle_upstream_message(frame, &handle, &limiter).await.unwrap();
        }

        let (_, data) = sensor.recv().await.unwrap();
        assert_eq!(data, "Definitely person good near door .");
    }

    #[tokio::test]
    async fn upstream_commands_are_rate_limited() {
        let (bus, handle) = spawn_driver();
        let mut deckard = bus.subscribe_topic("/robot_command/Deckard");
        let limiter = limiter(1);
        let frame = r#"{"topic":"/panel/command","msg":{"data":"forward"}}"#;

        assert!(handle_upstream_message(frame, &handle, &limiter).await.is_some());
        assert!(handle_upstream_message(frame, &handle, &limiter).await.is_none());

        let (topic, _) = deckard.recv().await.unwrap();
        assert_eq!(topic, "/robot_command/Deckard");
    }

    #[tokio::test]
    async fn rate_limit_does_not_apply_to_selection() {
        let (_, handle) = spawn_driver();
        let limiter = limiter(1);
        for robot in ["Roy", "Pris", "Zhora"] {
            let frame = format!(r#"{{"topic":"/panel/control","msg":{{"robot":"{robot}"}}}}"#);
            assert!(handle_upstream_message(&frame, &handle, &limiter).await.is_some());
        }
    }

    #[tokio::test]
    async fn upstream_invalid_json_is_ignored() {
        let (_, handle) = spawn_driver();
        assert!(handle_upstream_message("{{{", &handle, &limiter(10)).await.is_none());
    }

    // ── Misc ──────────────────────────────────────────────────────────────────

    #[test]
    fn websocket_upgrade_detection() {
        assert!(is_websocket_upgrade("GET / HTTP/1.1\r\nUpgrade: websocket\r\n"));
        assert!(!is_websocket_upgrade("GET / HTTP/1.1\r\nAccept: text/html\r\n"));
    }

    #[test]
    fn panel_html_contains_websocket_connect_code() {
        assert!(PANEL_HTML.contains("WebSocket"));
        assert!(PANEL_HTML.contains("/panel/submit"));
    }

    #[test]
    fn panel_html_contains_wasd_binding() {
        assert!(PANEL_HTML.contains("KeyW"));
    }

    #[test]
    fn panel_html_takes_field_options_from_state() {
        assert!(PANEL_HTML.contains("active.options[i]"));
        assert!(!PANEL_HTML.contains("the billiard room"));
    }
}
