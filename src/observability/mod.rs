//! Observability: structured logging setup.

pub mod logging;

pub use logging::{init_default_logging, init_for_device, init_logging, LogFormat};
