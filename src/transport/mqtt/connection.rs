//! Pure connection configuration for the IoT hub client.
//!
//! Everything here is a deterministic function of the device config, kept
//! separate from the connection driver so option construction and topic
//! naming stay testable without a broker.

use crate::config::Device;
use rumqttc::{MqttOptions, Transport};
use std::time::Duration;

/// MQTT over TLS, the primary transport.
pub const MQTT_TLS_PORT: u16 = 8883;
/// WebSocket over TLS, the fallback transport.
pub const WSS_PORT: u16 = 443;

const API_VERSION: &str = "2021-04-12";
const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Which wire transport a connection attempt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tls,
    WebSocket,
}

/// Resource URI the SAS token is scoped to.
pub fn resource_uri(device: &Device) -> String {
    format!("{}/devices/{}", device.azure_iot_hub_host, device.device_id)
}

/// Username the hub expects alongside a SAS password.
pub fn broker_username(device: &Device) -> String {
    format!(
        "{}/{}/?api-version={API_VERSION}",
        device.azure_iot_hub_host, device.device_id
    )
}

/// Cloud-to-device subscription topic for one device.
pub fn devicebound_topic(device_id: &str) -> String {
    format!("devices/{device_id}/messages/devicebound/#")
}

/// Build client options for one attempt over the given transport.
///
/// Auto-reconnect stays disabled: the event loop is polled only until its
/// first failure, and redialing belongs to the agent loop so backoff timing
/// and stream lifetime stay observable.
pub fn configure_mqtt_options(device: &Device, sas_token: &str, kind: TransportKind) -> MqttOptions {
    let mut options = match kind {
        TransportKind::Tls => {
            let mut options = MqttOptions::new(
                device.device_id.as_str(),
                device.azure_iot_hub_host.as_str(),
                MQTT_TLS_PORT,
            );
            options.set_transport(Transport::tls_with_default_config());
            options
        }
        TransportKind::WebSocket => {
            // For websockets the broker address is the full endpoint URL.
            let url = format!("wss://{}/$iothub/websocket", device.azure_iot_hub_host);
            let mut options = MqttOptions::new(device.device_id.as_str(), url, WSS_PORT);
            options.set_transport(Transport::wss_with_default_config());
            options
        }
    };

    options.set_credentials(broker_username(device), sas_token);
    options.set_keep_alive(KEEP_ALIVE);
    options.set_clean_session(true);
    options
}
