//! Forwarding of panel traffic to a `rosbridge_server`.
//!
//! [`RosbridgeForwarder`] subscribes to the command and observation lanes of
//! the [`EventBus`] and relays every [`EventPayload::Publish`] to the robots'
//! broker as `std_msgs/String` messages.  A topic is advertised the first
//! time it is seen.
//!
//! Delivery is best effort.  The forwarder never reports back to the panel.
//! [`RosbridgeForwarder::run`] handles one broker session;
//! [`RosbridgeForwarder::run_with_retry`] reconnects with exponential backoff
//! for the rest of the process lifetime.  Traffic published while
//! disconnected is dropped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use cnr_types::{Event, EventPayload, PanelError};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

use crate::bus::{EventBus, Topic};

/// ROS message type used for every forwarded payload.
pub const STRING_MSG_TYPE: &str = "std_msgs/String";

const INITIAL_RETRY: Duration = Duration::from_millis(500);
const MAX_RETRY: Duration = Duration::from_secs(30);

/// Relays published payloads from the bus to a rosbridge WebSocket.
pub struct RosbridgeForwarder {
    bus: Arc<EventBus>,
    url: String,
    initial_retry: Duration,
    max_retry: Duration,
}

impl RosbridgeForwarder {
    /// `url` is the rosbridge endpoint, e.g. `"ws://localhost:9090"`.
    pub fn new(bus: Arc<EventBus>, url: impl Into<String>) -> Self {
        Self {
            bus,
            url: url.into(),
            initial_retry: INITIAL_RETRY,
            max_retry: MAX_RETRY,
        }
    }

    /// Override the reconnect backoff bounds (builder-style).
    pub fn with_retry(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_retry = initial;
        self.max_retry = max.max(initial);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build the rosbridge `advertise` frame for `topic`.
    pub fn advertise_frame(topic: &str) -> String {
        json!({
            "op": "advertise",
            "topic": topic,
            "type": STRING_MSG_TYPE
        })
        .to_string()
    }

    /// Build the rosbridge `publish` frame carrying `data` on `topic`.
    pub fn publish_frame(topic: &str, data: &str) -> String {
        json!({
            "op": "publish",
            "topic": topic,
            "msg": { "data": data }
        })
        .to_string()
    }

    /// Frames to send for `event`: an `advertise` for a topic not yet in
    /// `advertised`, then the `publish`.  Non-publish events yield nothing.
    pub fn frames_for(advertised: &mut HashSet<String>, event: &Event) -> Vec<String> {
        let EventPayload::Publish { topic, data } = &event.payload else {
            return Vec::new();
        };
        let mut frames = Vec::with_capacity(2);
        if advertised.insert(topic.clone()) {
            frames.push(Self::advertise_frame(topic));
        }
        frames.push(Self::publish_frame(topic, data));
        frames
    }

    /// Connect to the broker and forward traffic until either side closes.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::Channel`] if the WebSocket handshake fails.
    pub async fn run(&self) -> Result<(), PanelError> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| PanelError::Channel(format!("rosbridge connect to {}: {e}", self.url)))?;
        info!(url = %self.url, "connected to rosbridge");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let mut commands = self.bus.subscribe_to(Topic::RobotCommands);
        let mut observations = self.bus.subscribe_to(Topic::HumanSensor);
        let mut advertised = HashSet::new();

        loop {
            let next = tokio::select! {
                result = commands.recv() => result,
                result = observations.recv() => result,
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            warn!(url = %self.url, error = %e, "rosbridge read error");
                            break;
                        }
                        // Status frames from the broker are not interesting here.
                        Some(Ok(_)) => continue,
                    }
                }
            };

            match next {
                Ok(event) => {
                    for frame in Self::frames_for(&mut advertised, &event) {
                        if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                            warn!(url = %self.url, error = %e, "rosbridge send failed");
                            return Ok(());
                        }
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(url = %self.url, lagged_by = n, "rosbridge forwarder lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }

        info!(url = %self.url, "rosbridge forwarder stopped");
        Ok(())
    }

    /// Keep a broker session up forever.  Failed connects back off
    /// exponentially up to the configured maximum; a session that was
    /// established resets the delay.
    pub async fn run_with_retry(self) {
        let mut delay = self.initial_retry;
        loop {
            match self.run().await {
                Ok(()) => {
                    delay = self.initial_retry;
                    warn!(url = %self.url, retry_in_ms = delay.as_millis() as u64, "rosbridge session ended; reconnecting");
                }
                Err(e) => {
                    warn!(
                        url = %self.url,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "rosbridge unavailable; robot traffic is not forwarded until it reconnects"
                    );
                }
            }
            tokio::time::sleep(delay).await;
            if delay < self.max_retry {
                delay = (delay * 2).min(self.max_retry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn publish_event(topic: &str, data: &str) -> Event {
        Event::new(
            "test",
            EventPayload::Publish {
                topic: topic.to_string(),
                data: data.to_string(),
            },
        )
    }

    #[test]
    fn advertise_frame_declares_string_type() {
        let frame: Value = serde_json::from_str(&RosbridgeForwarder::advertise_frame("/human_sensor")).unwrap();
        assert_eq!(frame["op"], "advertise");
        assert_eq!(frame["topic"], "/human_sensor");
        assert_eq!(frame["type"], "std_msgs/String");
    }

    #[test]
    fn publish_frame_wraps_payload_in_data() {
        let frame: Value =
            serde_json::from_str(&RosbridgeForwarder::publish_frame("/robot_command/Roy", "forward")).unwrap();
        assert_eq!(frame["op"], "publish");
        assert_eq!(frame["topic"], "/robot_command/Roy");
        assert_eq!(frame["msg"]["data"], "forward");
    }

    #[test]
    fn frames_for_advertises_each_topic_once() {
        let mut advertised = HashSet::new();

        let first = RosbridgeForwarder::frames_for(&mut advertised, &publish_event("/robot_command/Roy", "forward"));
        assert_eq!(first.len(), 2);
        assert!(first[0].contains("advertise"));

        let second = RosbridgeForwarder::frames_for(&mut advertised, &publish_event("/robot_command/Roy", "stop"));
        assert_eq!(second.len(), 1);
        assert!(second[0].contains("stop"));
    }

    #[test]
    fn frames_for_ignores_non_publish_events() {
        let mut advertised = HashSet::new();
        let event = Event::new(
            "test",
            EventPayload::TabChanged {
                category: "Area".to_string(),
            },
        );
        assert!(RosbridgeForwarder::frames_for(&mut advertised, &event).is_empty());
        assert!(advertised.is_empty());
    }

    #[test]
    fn url_stored_correctly() {
        let forwarder = RosbridgeForwarder::new(Arc::new(EventBus::default()), "ws://robot.local:9090");
        assert_eq!(forwarder.url(), "ws://robot.local:9090");
    }

    #[tokio::test]
    async fn run_fails_when_broker_unreachable() {
        // Port 9 (discard) is essentially never a WebSocket server.
        let forwarder = RosbridgeForwarder::new(Arc::new(EventBus::default()), "ws://127.0.0.1:9");
        assert!(matches!(forwarder.run().await, Err(PanelError::Channel(_))));
    }

    #[tokio::test]
    async fn reconnects_once_the_broker_comes_up() {
        use crate::channel::MessageChannel;
        use tokio::net::TcpListener;

        // Reserve a free port, then leave it closed so the first connects fail.
        let port = {
            let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            reserved.local_addr().unwrap().port()
        };
        let bus = Arc::new(EventBus::default());
        let forwarder = RosbridgeForwarder::new(Arc::clone(&bus), format!("ws://127.0.0.1:{port}"))
            .with_retry(Duration::from_millis(20), Duration::from_millis(100));
        let task = tokio::spawn(forwarder.run_with_retry());

        tokio::time::sleep(Duration::from_millis(150)).await;
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
            .await
            .expect("forwarder must reconnect")
            .unwrap();
        let mut broker = tokio_tungstenite::accept_async(stream).await.unwrap();

        // The lanes are subscribed after the handshake, so keep publishing
        // until the first frame arrives.
        let first = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                bus.publish("/robot_command/Roy", "forward");
                tokio::select! {
                    msg = broker.next() => break msg,
                    _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                }
            }
        })
        .await
        .expect("frames must be forwarded")
        .expect("broker stream open")
        .unwrap();

        let frame: Value = serde_json::from_str(first.to_text().unwrap()).unwrap();
        assert_eq!(frame["op"], "advertise");
        assert_eq!(frame["topic"], "/robot_command/Roy");
        task.abort();
    }
}
