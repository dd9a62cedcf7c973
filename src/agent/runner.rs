//! The agent loop.
//!
//! Repeatedly obtains an event stream from the broker and consumes it to its
//! terminal event. Every received message is dispatched onto its own task;
//! the loop itself never waits on a handler, so message N+1 may finish and
//! post back before message N. Connection failures feed the backoff
//! generator, which times the next dial.

use crate::backoff::ReconnectBackoff;
use crate::config::Device;
use crate::error::AgentError;
use crate::interpreter::{ExecutionResult, Message};
use crate::postback::PostbackClient;
use crate::shutdown;
use crate::transport::{Broker, BrokerEvent};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Composition root: one instance per process, one connection attempt at a
/// time.
pub struct Agent<B: Broker> {
    device: Arc<Device>,
    broker: B,
    postback: Arc<PostbackClient>,
    backoff: ReconnectBackoff,
    shutdown_rx: watch::Receiver<bool>,
}

impl<B: Broker> Agent<B> {
    pub fn new(device: Device, broker: B, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            device: Arc::new(device),
            broker,
            postback: Arc::new(PostbackClient::new()),
            backoff: ReconnectBackoff::new(),
            shutdown_rx,
        }
    }

    /// Run until the cancellation signal fires.
    ///
    /// Already-dispatched message tasks are not drained on exit; at-most-once
    /// execution per message is accepted.
    pub async fn run(&mut self) -> Result<(), AgentError> {
        loop {
            let delay = self.backoff.timeout();
            if !delay.is_zero() {
                info!(delay = ?delay, "reconnecting after delay");
                let mut rx = self.shutdown_rx.clone();
                if shutdown::cancellable_sleep(delay, &mut rx).await.is_err() {
                    info!("agent loop cancelled during reconnect delay");
                    return Ok(());
                }
            }
            self.backoff.next();

            let mut events = self
                .broker
                .connect(&self.device, self.shutdown_rx.clone());

            while let Some(event) = events.recv().await {
                match event {
                    BrokerEvent::Connecting => {
                        info!(host = %self.device.azure_iot_hub_host, "connecting to broker");
                    }
                    BrokerEvent::Connected => {
                        info!("connected to broker");
                    }
                    BrokerEvent::Subscribed => {
                        info!(device_id = %self.device.device_id, "subscribed to device-bound messages");
                        // A confirmed subscription restarts the schedule; the
                        // next redial after a loss waits one floor interval.
                        self.backoff.clear();
                        self.backoff.next();
                    }
                    BrokerEvent::MessageReceived(payload) => {
                        self.dispatch(payload);
                    }
                    BrokerEvent::ConnectionLost(reason) => {
                        warn!(reason = %reason, "connection lost");
                        break;
                    }
                    BrokerEvent::Error(e) => {
                        error!(error = %e, "connection attempt failed");
                        break;
                    }
                    BrokerEvent::Cancelled => {
                        info!("agent loop cancelled");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Spawn an independent task for one inbound payload.
    fn dispatch(&self, payload: bytes::Bytes) {
        let device = self.device.clone();
        let postback = self.postback.clone();
        let shutdown_rx = self.shutdown_rx.clone();

        tokio::spawn(async move {
            handle_message(&payload, &device, &postback, shutdown_rx).await;
        });
    }
}

/// Decode → execute → postback for one message.
///
/// Errors never escape this task: they become a result payload and a
/// postback attempt, then the task ends. Nothing here terminates the
/// process.
async fn handle_message(
    payload: &[u8],
    device: &Device,
    postback: &PostbackClient,
    shutdown_rx: watch::Receiver<bool>,
) {
    let message = match Message::parse(payload) {
        Ok(message) => message,
        Err(e) => {
            error!(error = %e, "failed to parse message payload");
            return;
        }
    };

    let body = match message.execute(device, shutdown_rx).await {
        Ok(outcome) => serde_json::to_vec(&outcome),
        Err(AgentError::Cancelled) => {
            warn!(post_id = %message.post_id, "execution cancelled by shutdown");
            return;
        }
        Err(e) => {
            error!(post_id = %message.post_id, error = %e, "execution failed");
            serde_json::to_vec(&ExecutionResult::from_error(&e))
        }
    };

    let body = match body {
        Ok(body) => body,
        Err(e) => {
            error!(post_id = %message.post_id, error = %e, "failed to serialize result");
            return;
        }
    };

    match postback.send(&message.post_id, device, body).await {
        Ok(outcome) => {
            debug!(post_id = %message.post_id, ?outcome, "postback finished");
        }
        Err(e) => {
            // Postback failures are logged and dropped; no retry.
            error!(post_id = %message.post_id, error = %e, "postback failed");
        }
    }
}
