//! Error taxonomy for the agent.
//!
//! Connection-level errors travel through the broker event stream to the
//! agent loop, which is the sole decision point for retry vs. shutdown.
//! Message-level errors never escape the per-message task; they are turned
//! into a result payload and a postback attempt.

use thiserror::Error;

/// Main error type for agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The shared access key could not be decoded. Fatal for the current
    /// connection attempt; the caller must not try to connect with it.
    #[error("invalid shared access key: {0}")]
    Credential(String),

    #[error("broker connect failed: {0}")]
    Connect(String),

    #[error("broker subscribe failed: {0}")]
    Subscribe(String),

    /// The transport reported loss while subscribed. Retriable.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The process-wide cancellation signal fired mid-operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Malformed message payload or command body. Local to one message.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The script process could not be started or awaited.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The message carried neither commands nor an installation request.
    #[error("message contained no work")]
    EmptyMessage,

    #[error("postback failed: {0}")]
    Postback(String),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
