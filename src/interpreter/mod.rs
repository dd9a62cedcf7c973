//! Inbound message interpretation.
//!
//! One broker payload becomes one [`Message`]: parsed, executed once, and
//! discarded. The interpreter holds no shared mutable state across
//! invocations apart from the scripts directory, so any number of messages
//! may execute concurrently.

use crate::agent::paths::{self, InstallationData};
use crate::config::Device;
use crate::error::AgentError;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::watch;
use tracing::debug;

pub mod decode;
pub mod shell;

pub use shell::{Shell, VERSION_ENV_VAR};

/// Captured output of a completed script process.
///
/// A non-zero exit code is not a distinguishable field; stderr text carries
/// it. Decode and start failures reuse this shape with `error` populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResult {
    pub error: String,
    pub output: String,
}

impl ExecutionResult {
    /// Result shape for a message that failed before producing any output.
    pub fn from_error(error: &AgentError) -> Self {
        Self {
            error: error.to_string(),
            output: String::new(),
        }
    }
}

/// Execution strategy requested by the message, resolved at parse time.
///
/// The wire value is a string naming an interpreter or a boolean meaning "no
/// override"; unknown names fall back to the platform default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InterpreterOverride {
    #[default]
    Unset,
    Bash,
    PowerShell,
    Pwsh,
}

impl InterpreterOverride {
    fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "bash" => Self::Bash,
            "powershell" => Self::PowerShell,
            "pwsh" => Self::Pwsh,
            _ => Self::Unset,
        }
    }
}

impl<'de> Deserialize<'de> for InterpreterOverride {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Null | serde_json::Value::Bool(_) => Ok(Self::Unset),
            serde_json::Value::String(name) => Ok(Self::from_name(&name)),
            other => Err(serde::de::Error::custom(format!(
                "unsupported interpreter_override type: {other}"
            ))),
        }
    }
}

/// One inbound unit of work.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    /// Correlates logs and builds the postback URL. Empty means "do not
    /// report back".
    #[serde(default)]
    pub post_id: String,
    /// Base64 over UTF-16LE script text.
    #[serde(default)]
    pub commands: Option<String>,
    #[serde(default)]
    pub interpreter_override: InterpreterOverride,
    /// Alternate no-script request for installation metadata.
    #[serde(default)]
    pub get_installation: bool,
}

/// What one message produced, ready for postback serialization.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum InterpreterOutcome {
    Execution(ExecutionResult),
    Installation(InstallationData),
}

impl Message {
    /// Parse one broker payload.
    pub fn parse(payload: &[u8]) -> Result<Self, AgentError> {
        serde_json::from_slice(payload)
            .map_err(|e| AgentError::Decode(format!("malformed message payload: {e}")))
    }

    /// Decode and run this message.
    ///
    /// Commands win over `get_installation` when both are present; a message
    /// carrying neither is rejected without side effects.
    pub async fn execute(
        &self,
        device: &Device,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<InterpreterOutcome, AgentError> {
        if let Some(commands) = &self.commands {
            let script = decode::decode_commands(commands)?;
            let shell = shell::resolve(self.interpreter_override, cfg!(windows));
            debug!(post_id = %self.post_id, shell = shell.program(), "executing commands");

            let scripts_dir = paths::scripts_directory(&device.rewst_org_id);
            let result =
                shell::run_script(shell, &script, &scripts_dir, &self.post_id, shutdown_rx).await?;
            return Ok(InterpreterOutcome::Execution(result));
        }

        if self.get_installation {
            debug!(post_id = %self.post_id, "collecting installation data");
            return Ok(InterpreterOutcome::Installation(InstallationData::collect(
                &device.rewst_org_id,
            )));
        }

        Err(AgentError::EmptyMessage)
    }
}
