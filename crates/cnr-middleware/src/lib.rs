//! `cnr-middleware` – Panel Transport
//!
//! Routes published payloads between the control panel core, the cockpit
//! browser clients and the robots' rosbridge broker without caring about the
//! payloads' meaning.
//!
//! # Modules
//!
//! - [`channel`] – the fire-and-forget [`MessageChannel`] publish interface
//!   the core talks to, plus an in-memory recorder.
//! - [`bus`] – Headless, topic-laned publish/subscribe event bus built on
//!   Tokio broadcast channels.  Implements [`MessageChannel`].
//! - [`rosbridge`] – Forwards command and observation traffic from the bus
//!   to a `rosbridge_server` WebSocket.

pub mod bus;
pub mod channel;
pub mod rosbridge;

pub use bus::{EventBus, Topic, TopicReceiver, TopicSubscriber};
pub use channel::{MemoryChannel, MessageChannel};
pub use rosbridge::RosbridgeForwarder;
