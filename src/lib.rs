//! Persistent device agent for Rewst-managed hosts.
//!
//! The agent keeps a durable, SAS-authenticated MQTT connection to Azure IoT
//! Hub, receives cloud-to-device command messages, executes them as local
//! shell scripts, and reports results back to a per-message webhook over
//! HTTPS.
//!
//! # Overview
//!
//! - [`transport`]: broker event stream, SAS credentials, the connection
//!   state machine, and the [`transport::Broker`] seam
//! - [`interpreter`]: message decoding and script execution strategies
//! - [`postback`]: result reporting and response classification
//! - [`agent`]: the composition root tying stream, interpreter and postback
//!   together with reconnect backoff
//!
//! # Quick start
//!
//! ```rust
//! use rewst_agent::interpreter::Message;
//!
//! let message = Message::parse(
//!     br#"{"post_id": "abc:123", "get_installation": true}"#,
//! )
//! .unwrap();
//!
//! assert_eq!(message.post_id, "abc:123");
//! assert!(message.get_installation);
//! ```

pub mod agent;
pub mod backoff;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod observability;
pub mod postback;
pub mod service;
pub mod shutdown;
pub mod transport;

pub use agent::{Agent, InstallationData};
pub use backoff::ReconnectBackoff;
pub use config::{Device, LoggingLevel};
pub use error::{AgentError, AgentResult};
pub use interpreter::{ExecutionResult, InterpreterOverride, Message};
pub use postback::{PostbackClient, PostbackOutcome};
pub use service::ServiceControl;
pub use transport::mqtt::IotHubBroker;
pub use transport::{Broker, BrokerEvent};
