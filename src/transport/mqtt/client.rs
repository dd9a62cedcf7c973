//! Connection manager for the IoT hub broker.
//!
//! One `connect` call drives a single attempt through Connecting →
//! Subscribing → Subscribed and emits every transition on the returned
//! stream. The stream closes exactly once, when the background task observes
//! a terminal condition: connection loss, a failure, or cancellation.

use super::connection::{configure_mqtt_options, devicebound_topic, resource_uri, TransportKind};
use super::sas;
use crate::config::Device;
use crate::error::AgentError;
use crate::shutdown;
use crate::transport::{Broker, BrokerEvent, EventStream};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Packet, QoS, SubscribeReasonCode};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Broker implementation for Azure IoT Hub.
#[derive(Debug, Clone, Copy, Default)]
pub struct IotHubBroker;

impl IotHubBroker {
    pub fn new() -> Self {
        Self
    }
}

impl Broker for IotHubBroker {
    fn connect(&self, device: &Device, shutdown: watch::Receiver<bool>) -> EventStream {
        let (events, stream) = mpsc::unbounded_channel();
        let device = device.clone();
        tokio::spawn(run_connection(device, shutdown, events));
        stream
    }
}

/// Outcome of waiting for the connect acknowledgement.
enum ConnectOutcome {
    Open(AsyncClient, EventLoop),
    Cancelled,
}

/// Drive one connection attempt to its terminal event.
async fn run_connection(
    device: Device,
    mut shutdown: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<BrokerEvent>,
) {
    // Idle: a fresh token for every attempt, never renewed in place.
    let uri = resource_uri(&device);
    let token = match sas::generate_sas_token(&uri, &device.shared_access_key, sas::TOKEN_LIFETIME)
    {
        Ok(token) => token,
        Err(e) => {
            let _ = events.send(BrokerEvent::Error(e));
            return;
        }
    };

    let _ = events.send(BrokerEvent::Connecting);

    if shutdown::is_cancelled(&shutdown) {
        let _ = events.send(BrokerEvent::Cancelled);
        return;
    }

    // Connecting: race the connect acknowledgement against cancellation.
    let (client, mut event_loop) = match open_connection(&device, &token, &mut shutdown).await {
        Ok(ConnectOutcome::Open(client, event_loop)) => (client, event_loop),
        Ok(ConnectOutcome::Cancelled) => {
            let _ = events.send(BrokerEvent::Cancelled);
            return;
        }
        Err(e) => {
            let _ = events.send(BrokerEvent::Error(e));
            return;
        }
    };

    let _ = events.send(BrokerEvent::Connected);

    // Subscribing: request the device-bound topic at QoS 1.
    let topic = devicebound_topic(&device.device_id);
    if let Err(e) = client.subscribe(topic.as_str(), QoS::AtLeastOnce).await {
        let _ = client.disconnect().await;
        let _ = events.send(BrokerEvent::Error(AgentError::Subscribe(e.to_string())));
        return;
    }

    let mut subscribed = false;
    loop {
        tokio::select! {
            _ = shutdown::cancelled(&mut shutdown) => {
                let _ = client.disconnect().await;
                let _ = events.send(BrokerEvent::Cancelled);
                return;
            }
            polled = event_loop.poll() => {
                match polled {
                    Ok(Event::Incoming(Packet::SubAck(ack))) if !subscribed => {
                        let rejected = ack
                            .return_codes
                            .iter()
                            .any(|code| matches!(code, SubscribeReasonCode::Failure));
                        if rejected {
                            let _ = client.disconnect().await;
                            let _ = events.send(BrokerEvent::Error(AgentError::Subscribe(
                                format!("subscription rejected: {:?}", ack.return_codes),
                            )));
                            return;
                        }
                        subscribed = true;
                        let _ = events.send(BrokerEvent::Subscribed);
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        debug!(
                            topic = %publish.topic,
                            bytes = publish.payload.len(),
                            "message received"
                        );
                        // Unbounded send: emission never waits on the consumer.
                        let _ = events.send(BrokerEvent::MessageReceived(publish.payload));
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        let _ = events.send(terminal_event(subscribed, "broker sent disconnect"));
                        return;
                    }
                    Ok(event) => {
                        debug!(?event, "mqtt event");
                    }
                    Err(e) => {
                        // First poll failure ends the attempt; redialing is
                        // the agent loop's job, not the transport's.
                        let _ = events.send(terminal_event(subscribed, &e.to_string()));
                        return;
                    }
                }
            }
        }
    }
}

/// Terminal event for a transport failure, depending on how far the attempt
/// got: loss after a working subscription is retriable `ConnectionLost`,
/// anything earlier is a subscribe failure.
fn terminal_event(subscribed: bool, reason: &str) -> BrokerEvent {
    if subscribed {
        BrokerEvent::ConnectionLost(reason.to_string())
    } else {
        BrokerEvent::Error(AgentError::Subscribe(reason.to_string()))
    }
}

/// Open a connection, preferring TLS and falling back to the websocket
/// endpoint once if the TLS dial fails. The primary error is reported when
/// both transports fail.
async fn open_connection(
    device: &Device,
    token: &str,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<ConnectOutcome, AgentError> {
    match open_with_transport(device, token, TransportKind::Tls, shutdown).await {
        Ok(outcome) => Ok(outcome),
        Err(primary) => {
            warn!(error = %primary, "tls connect failed, trying websocket transport");
            match open_with_transport(device, token, TransportKind::WebSocket, shutdown).await {
                Ok(outcome) => Ok(outcome),
                Err(fallback) => {
                    debug!(error = %fallback, "websocket connect failed");
                    Err(primary)
                }
            }
        }
    }
}

/// Poll a fresh event loop until the broker acknowledges the connection,
/// racing against cancellation.
async fn open_with_transport(
    device: &Device,
    token: &str,
    kind: TransportKind,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<ConnectOutcome, AgentError> {
    let options = configure_mqtt_options(device, token, kind);
    let (client, mut event_loop) = AsyncClient::new(options, 16);

    loop {
        tokio::select! {
            _ = shutdown::cancelled(shutdown) => {
                return Ok(ConnectOutcome::Cancelled);
            }
            polled = event_loop.poll() => {
                match polled {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        if ack.code == ConnectReturnCode::Success {
                            return Ok(ConnectOutcome::Open(client, event_loop));
                        }
                        return Err(AgentError::Connect(format!(
                            "broker refused connection: {:?}",
                            ack.code
                        )));
                    }
                    Ok(event) => {
                        debug!(?event, "mqtt event before connack");
                    }
                    Err(e) => {
                        return Err(AgentError::Connect(e.to_string()));
                    }
                }
            }
        }
    }
}
