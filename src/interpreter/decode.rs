//! Command payload decoding.
//!
//! The `commands` field is base64 over UTF-16LE text. Decoding is strict: a
//! payload that is not valid base64, has an odd byte count, or contains
//! unpaired surrogates is rejected before any execution happens.

use crate::error::AgentError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Decode a `commands` field into script text.
pub fn decode_commands(commands: &str) -> Result<String, AgentError> {
    let raw = BASE64
        .decode(commands)
        .map_err(|e| AgentError::Decode(format!("invalid base64: {e}")))?;
    utf16le_to_string(&raw)
}

/// Inverse of [`decode_commands`], as the control plane encodes scripts.
pub fn encode_commands(script: &str) -> String {
    let mut bytes = Vec::with_capacity(script.len() * 2);
    for unit in script.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    BASE64.encode(bytes)
}

/// Strict UTF-16LE decode. A byte-order mark is not interpreted; a leading
/// U+FEFF stays in the text.
fn utf16le_to_string(bytes: &[u8]) -> Result<String, AgentError> {
    if bytes.len() % 2 != 0 {
        return Err(AgentError::Decode(format!(
            "UTF-16LE payload has odd length {}",
            bytes.len()
        )));
    }

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    String::from_utf16(&units).map_err(|e| AgentError::Decode(format!("invalid UTF-16LE: {e}")))
}
