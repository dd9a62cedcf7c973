//! Structured logging using the tracing crate.
//!
//! Output format is controlled by the `LOG_FORMAT` environment variable
//! (`json`, `pretty`, `compact`; default `json`). The filter level comes
//! from the device config's `logging_level` when set, otherwise from
//! `LOG_LEVEL`, and `RUST_LOG` overrides everything.

use crate::config::Device;
use std::env;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format options.
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    /// Structured JSON for log aggregation.
    Json,
    /// Human-readable with colors and indentation.
    Pretty,
    /// Terminal-friendly, minimal spacing.
    Compact,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// Initialize logging with an explicit filter directive and format.
pub fn init_logging(directive: &str, format: LogFormat) {
    let mut filter = EnvFilter::new(directive)
        // Quiet the dependency chatter.
        .add_directive("rumqttc=warn".parse().expect("static directive"))
        .add_directive("hyper=warn".parse().expect("static directive"))
        .add_directive("reqwest=warn".parse().expect("static directive"))
        .add_directive("tokio=warn".parse().expect("static directive"));

    if let Ok(rust_log) = env::var("RUST_LOG") {
        filter = EnvFilter::new(rust_log);
    }

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => {
            subscriber.with(fmt::layer().json()).init();
        }
        LogFormat::Pretty => {
            subscriber.with(fmt::layer().pretty().with_ansi(true)).init();
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_ansi(true).with_target(false))
                .init();
        }
    }
}

/// Initialize logging from environment variables only.
pub fn init_default_logging() {
    init_logging(&env_directive(), env_format());
}

/// Initialize logging for a loaded device config. The config's
/// `logging_level` wins over `LOG_LEVEL`; `syslog` selects the compact
/// single-line format expected by system log collectors.
pub fn init_for_device(device: &Device) {
    let directive = device
        .logging_level
        .directive()
        .map(str::to_string)
        .unwrap_or_else(env_directive);

    let format = if device.use_syslog {
        LogFormat::Compact
    } else {
        env_format()
    };

    init_logging(&directive, format);
}

fn env_directive() -> String {
    env::var("LOG_LEVEL")
        .map(|level| level.to_lowercase())
        .unwrap_or_else(|_| "info".to_string())
}

fn env_format() -> LogFormat {
    LogFormat::parse(&env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()))
}
