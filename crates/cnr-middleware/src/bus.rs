//! Headless, topic-laned publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! Traffic is partitioned into three [`Topic`] lanes so components only
//! receive the messages they care about:
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::RobotCommands`] | Raw teleop payloads on `/robot_command/{robot}` |
//! | [`Topic::HumanSensor`] | Encoded observations on `/human_sensor` |
//! | [`Topic::PanelState`] | Selection changes and backend process output |
//!
//! Every event is also mirrored onto a global channel for consumers that
//! want the whole stream (the cockpit WebSocket bridge).

use cnr_types::{Event, EventPayload, HUMAN_SENSOR_TOPIC, PanelError, ROBOT_COMMAND_PREFIX};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::channel::MessageChannel;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all routing lanes on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Raw per-robot teleop commands.
    RobotCommands,
    /// Human observation messages for the perception pipeline.
    HumanSensor,
    /// Panel selection changes and backend lifecycle events.
    PanelState,
}

impl Topic {
    /// Map a pub/sub topic name onto its bus lane.
    pub fn classify(name: &str) -> Topic {
        if name.starts_with(ROBOT_COMMAND_PREFIX) {
            Topic::RobotCommands
        } else if name == HUMAN_SENSOR_TOPIC {
            Topic::HumanSensor
        } else {
            Topic::PanelState
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    // Global channel, sees every event
    sender: broadcast::Sender<Event>,
    // Per-lane channels
    robot_commands: broadcast::Sender<Event>,
    human_sensor: broadcast::Sender<Event>,
    panel_state: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every lane independently.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        let (robot_commands, _) = broadcast::channel(capacity);
        let (human_sensor, _) = broadcast::channel(capacity);
        let (panel_state, _) = broadcast::channel(capacity);
        Self {
            sender,
            robot_commands,
            human_sensor,
            panel_state,
        }
    }

    // -----------------------------------------------------------------------
    // Lane API
    // -----------------------------------------------------------------------

    /// Publish `event` to the given [`Topic`] lane only.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`PanelError::Channel`] when nobody is listening on the lane.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, PanelError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| PanelError::Channel(format!("No subscribers for topic {topic:?}")))
    }

    /// Subscribe to a specific [`Topic`] lane.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    // -----------------------------------------------------------------------
    // Global API
    // -----------------------------------------------------------------------

    /// Publish an event to the global broadcast channel only.
    pub fn broadcast(&self, event: Event) -> Result<usize, PanelError> {
        self.sender
            .send(event)
            .map_err(|e| PanelError::Channel(format!("event bus send error: {e}")))
    }

    /// Subscribe to every event on the global broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Subscribe to [`EventPayload::Publish`] events whose pub/sub topic
    /// starts with `prefix` (e.g. `"/robot_command/Roy"`).
    pub fn subscribe_topic(&self, prefix: impl Into<String>) -> TopicSubscriber {
        TopicSubscriber {
            prefix: prefix.into(),
            receiver: self.sender.subscribe(),
        }
    }

    /// Send `event` on `topic`'s lane and the global channel.
    ///
    /// Missing subscribers are normal for a headless panel, so send failures
    /// are logged and dropped.
    pub fn emit(&self, topic: Topic, event: Event) {
        if let Err(e) = self.publish_to(topic, event.clone()) {
            debug!(?topic, error = %e, "lane publish dropped");
        }
        if let Err(e) = self.broadcast(event) {
            debug!(?topic, error = %e, "global publish dropped");
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::RobotCommands => &self.robot_commands,
            Topic::HumanSensor => &self.human_sensor,
            Topic::PanelState => &self.panel_state,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MessageChannel for EventBus {
    fn publish(&self, topic: &str, payload: &str) {
        let event = Event::new(
            "cnr-middleware::bus",
            EventPayload::Publish {
                topic: topic.to_string(),
                data: payload.to_string(),
            },
        );
        debug!(topic, bytes = payload.len(), "publish");
        self.emit(Topic::classify(topic), event);
    }
}

// ---------------------------------------------------------------------------
// Lane receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] lane.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this lane.
    ///
    /// `Lagged(n)` means the subscriber fell behind and `n` messages were
    /// dropped; `Closed` means the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

// ---------------------------------------------------------------------------
// Pub/sub topic-prefix subscriber
// ---------------------------------------------------------------------------

/// A subscriber that only delivers published payloads whose pub/sub topic
/// starts with a given prefix.
pub struct TopicSubscriber {
    prefix: String,
    receiver: broadcast::Receiver<Event>,
}

impl TopicSubscriber {
    /// Wait for the next matching `(topic, data)` pair.
    ///
    /// Returns `None` when the bus is closed and no further events will arrive.
    pub async fn recv(&mut self) -> Option<(String, String)> {
        loop {
            match self.receiver.recv().await {
                Ok(Event {
                    payload: EventPayload::Publish { topic, data },
                    ..
                }) if topic.starts_with(&self.prefix) => return Some((topic, data)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(prefix = %self.prefix, lagged_by = n, "TopicSubscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(robot: &str) -> Event {
        Event::new(
            "cnr-core::panel",
            EventPayload::ControlChanged {
                robot: robot.to_string(),
            },
        )
    }

    #[test]
    fn classify_maps_topic_names_to_lanes() {
        assert_eq!(Topic::classify("/robot_command/Roy"), Topic::RobotCommands);
        assert_eq!(Topic::classify("/human_sensor"), Topic::HumanSensor);
        assert_eq!(Topic::classify("/human_sensor/extra"), Topic::PanelState);
        assert_eq!(Topic::classify("/panel/state"), Topic::PanelState);
    }

    #[tokio::test]
    async fn broadcast_and_receive() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = make_event("Pris");
        bus.broadcast(event.clone())?;

        let received = rx.recv().await?;
        assert_eq!(received.id, event.id);
        Ok(())
    }

    #[test]
    fn broadcast_without_subscribers_returns_error() {
        let bus = EventBus::default();
        assert!(matches!(
            bus.broadcast(make_event("Roy")),
            Err(PanelError::Channel(_))
        ));
    }

    #[test]
    fn message_channel_publish_without_subscribers_does_not_fail() {
        let bus = EventBus::default();
        // Fire and forget: nothing to assert beyond "does not panic".
        MessageChannel::publish(&bus, "/human_sensor", "Maybe nothing  unknown .");
    }

    #[tokio::test]
    async fn message_channel_publish_reaches_lane_and_global() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut lane = bus.subscribe_to(Topic::HumanSensor);
        let mut global = bus.subscribe();

        MessageChannel::publish(&bus, "/human_sensor", "Definitely person good near door .");

        for event in [lane.recv().await?, global.recv().await?] {
            match event.payload {
                EventPayload::Publish { topic, data } => {
                    assert_eq!(topic, "/human_sensor");
                    assert_eq!(data, "Definitely person good near door .");
                }
                other => panic!("unexpected payload {other:?}"),
            }
        }
        assert_eq!(lane.topic(), Topic::HumanSensor);
        Ok(())
    }

    #[tokio::test]
    async fn topic_subscriber_filters_by_prefix() {
        let bus = EventBus::default();
        let mut roy = bus.subscribe_topic("/robot_command/Roy");

        MessageChannel::publish(&bus, "/robot_command/Pris", "left");
        MessageChannel::publish(&bus, "/human_sensor", "Maybe robot is moving .");
        MessageChannel::publish(&bus, "/robot_command/Roy", "forward");

        let (topic, data) = roy.recv().await.expect("Roy must receive his command");
        assert_eq!(topic, "/robot_command/Roy");
        assert_eq!(data, "forward");
    }

    /// A subscriber on `HumanSensor` must not receive robot commands because
    /// they are routed through separate lanes.
    #[tokio::test]
    async fn lane_subscriber_does_not_receive_other_lane_events() {
        let bus = EventBus::default();
        let mut sensor = bus.subscribe_to(Topic::HumanSensor);

        MessageChannel::publish(&bus, "/robot_command/Deckard", "stop");

        let result = tokio::time::timeout(std::time::Duration::from_millis(50), sensor.recv()).await;
        assert!(result.is_err(), "HumanSensor lane must not see robot commands");
    }

    #[tokio::test]
    async fn lane_lag_on_slow_subscriber() {
        let bus = EventBus::new(16);
        let mut slow = bus.subscribe_to(Topic::RobotCommands);

        for _ in 0..1_000 {
            MessageChannel::publish(&bus, "/robot_command/Zhora", "forward");
        }

        let result = slow.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }
}
