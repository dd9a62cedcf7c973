//! Result postback over HTTPS.
//!
//! Every message that carries a `post_id` gets exactly one postback attempt.
//! Failures are logged and dropped; the webhook reporting itself already
//! fulfilled counts as success so redelivered messages stay idempotent.

use crate::config::Device;
use crate::error::AgentError;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

/// Header carrying the agent version on every postback request, so the
/// engine can branch on agent capability.
pub const VERSION_HEADER: &str = "x-rewst-agent-version";

/// How a postback attempt ended, short of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostbackOutcome {
    /// The webhook accepted the result.
    Delivered,
    /// The webhook was already completed by a previous attempt.
    AlreadyFulfilled,
    /// The message carried no post id; nothing to report to.
    Skipped,
}

#[derive(Debug, Deserialize)]
struct WebhookError {
    error: String,
}

/// HTTP client for webhook postbacks.
#[derive(Debug, Default)]
pub struct PostbackClient {
    http: reqwest::Client,
}

impl PostbackClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Webhook URL for one message. Colons in the post id are path
    /// separators on the engine side. An explicit scheme in the engine host
    /// is honored; bare hosts get `https`.
    pub fn postback_url(engine_host: &str, post_id: &str) -> String {
        let action = post_id.replace(':', "/");
        if engine_host.starts_with("http://") || engine_host.starts_with("https://") {
            format!("{engine_host}/webhooks/custom/action/{action}")
        } else {
            format!("https://{engine_host}/webhooks/custom/action/{action}")
        }
    }

    /// POST a serialized result body for one message.
    pub async fn send(
        &self,
        post_id: &str,
        device: &Device,
        body: Vec<u8>,
    ) -> Result<PostbackOutcome, AgentError> {
        if post_id.is_empty() {
            debug!("message has no post id, skipping postback");
            return Ok(PostbackOutcome::Skipped);
        }

        let url = Self::postback_url(&device.rewst_engine_host, post_id);
        info!(post_id, url = %url, "sending postback");

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(VERSION_HEADER, env!("CARGO_PKG_VERSION"))
            .body(body)
            .send()
            .await
            .map_err(|e| AgentError::Postback(format!("request failed: {e}")))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| AgentError::Postback(format!("failed to read response body: {e}")))?;

        let outcome = classify_response(status, &response_body)?;
        match outcome {
            PostbackOutcome::Delivered => {
                if !response_body.is_empty() {
                    info!(post_id, "postback response: {response_body}");
                }
            }
            PostbackOutcome::AlreadyFulfilled => {
                info!(post_id, "webhook already fulfilled");
            }
            PostbackOutcome::Skipped => {}
        }

        Ok(outcome)
    }
}

/// Classify a webhook response.
///
/// 200 is success. 400 with a JSON body whose `error` mentions "fulfilled"
/// means a previous attempt already completed the webhook; that is success
/// too. Everything else is a failure carrying the status and raw body.
pub fn classify_response(status: StatusCode, body: &str) -> Result<PostbackOutcome, AgentError> {
    if status == StatusCode::OK {
        return Ok(PostbackOutcome::Delivered);
    }

    if status == StatusCode::BAD_REQUEST {
        if let Ok(rejection) = serde_json::from_str::<WebhookError>(body) {
            if rejection.error.to_ascii_lowercase().contains("fulfilled") {
                return Ok(PostbackOutcome::AlreadyFulfilled);
            }
        }
    }

    Err(AgentError::Postback(format!(
        "webhook returned {status}: {body}"
    )))
}
