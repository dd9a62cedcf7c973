//! MQTT connection to Azure IoT Hub.
//!
//! Split the way the transport layer is usually split here: pure
//! configuration and credential generation (`connection`, `sas`) separate
//! from the impure connection driver (`client`).

pub mod client;
pub mod connection;
pub mod sas;

pub use client::IotHubBroker;
