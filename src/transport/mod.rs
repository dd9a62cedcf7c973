//! Transport layer for the broker connection.
//!
//! The agent loop consumes brokers through the [`Broker`] trait so the
//! concrete transport can be substituted in tests and, later, for other
//! message brokers. One `connect` call yields one event stream; the stream is
//! closed exactly once, after a terminal event.

use crate::config::Device;
use crate::error::AgentError;
use bytes::Bytes;
use tokio::sync::{mpsc, watch};

pub mod mqtt;

/// Events produced by a single connection attempt.
///
/// `ConnectionLost`, `Error` and `Cancelled` are terminal: the stream closes
/// after emitting one of them and no further events are produced.
#[derive(Debug)]
pub enum BrokerEvent {
    /// Dialing the broker.
    Connecting,
    /// Connect acknowledged by the broker.
    Connected,
    /// Device-bound subscription acknowledged.
    Subscribed,
    /// A cloud-to-device message arrived on the subscribed topic.
    MessageReceived(Bytes),
    /// The transport reported loss while subscribed.
    ConnectionLost(String),
    /// The attempt failed before a working subscription existed.
    Error(AgentError),
    /// The cancellation signal fired mid-attempt.
    Cancelled,
}

impl BrokerEvent {
    /// Whether the stream closes after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BrokerEvent::ConnectionLost(_) | BrokerEvent::Error(_) | BrokerEvent::Cancelled
        )
    }
}

/// Stream of events for one connection attempt. Unbounded so the producer
/// never blocks the transport read loop waiting on the consumer.
pub type EventStream = mpsc::UnboundedReceiver<BrokerEvent>;

/// Broker abstraction consumed by the agent loop.
pub trait Broker: Send + Sync {
    /// Start a connection attempt. Returns immediately; all work happens on
    /// a background task that closes the returned stream exactly once.
    fn connect(&self, device: &Device, shutdown: watch::Receiver<bool>) -> EventStream;
}
