//! Shared access signature generation for broker authentication.
//!
//! The token is a time-limited credential string signed with HMAC-SHA256
//! over `"<resourceURI>\n<expiry>"`, keyed by the base64-decoded shared
//! access key. The wire format must match the hub exactly:
//! `SharedAccessSignature sr=<uri>&sig=<base64 hmac>&se=<unix seconds>`.

use crate::error::AgentError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Token lifetime for one connection attempt. Tokens are never renewed in
/// place; a new attempt always regenerates.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Generate a SAS token valid for `lifetime` from now.
pub fn generate_sas_token(
    resource_uri: &str,
    shared_access_key: &str,
    lifetime: Duration,
) -> Result<String, AgentError> {
    let expiry = Utc::now().timestamp() + lifetime.as_secs() as i64;
    sign_sas_token(resource_uri, shared_access_key, expiry)
}

/// Sign a token for a fixed expiry. Deterministic given the expiry, which
/// keeps the signature itself testable.
pub fn sign_sas_token(
    resource_uri: &str,
    shared_access_key: &str,
    expiry: i64,
) -> Result<String, AgentError> {
    let key = BASE64
        .decode(shared_access_key)
        .map_err(|e| AgentError::Credential(format!("failed to decode key: {e}")))?;

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| AgentError::Credential(e.to_string()))?;
    mac.update(format!("{resource_uri}\n{expiry}").as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    Ok(format!(
        "SharedAccessSignature sr={resource_uri}&sig={signature}&se={expiry}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::base64_key;
    use proptest::prelude::*;

    const RESOURCE_URI: &str = "hub.example.com/devices/device-123";

    /// Split a token back into its `sr`, `sig` and `se` fields.
    fn parse_token(token: &str) -> (String, String, i64) {
        let fields = token
            .strip_prefix("SharedAccessSignature ")
            .expect("token prefix");

        let mut sr = None;
        let mut sig = None;
        let mut se = None;
        for field in fields.split('&') {
            let (name, value) = field.split_once('=').expect("field separator");
            match name {
                "sr" => sr = Some(value.to_string()),
                "sig" => sig = Some(value.to_string()),
                "se" => se = Some(value.parse().expect("numeric expiry")),
                other => panic!("unexpected field: {other}"),
            }
        }
        (sr.unwrap(), sig.unwrap(), se.unwrap())
    }

    #[test]
    fn test_token_round_trips_fields() {
        let token = sign_sas_token(RESOURCE_URI, &base64_key(), 1_735_689_600).unwrap();
        let (sr, sig, se) = parse_token(&token);

        assert_eq!(sr, RESOURCE_URI);
        assert_eq!(se, 1_735_689_600);
        assert!(BASE64.decode(&sig).is_ok(), "signature must be base64");
    }

    #[test]
    fn test_expiry_tracks_clock() {
        let token = generate_sas_token(RESOURCE_URI, &base64_key(), TOKEN_LIFETIME).unwrap();
        let (_, _, se) = parse_token(&token);

        let expected = Utc::now().timestamp() + TOKEN_LIFETIME.as_secs() as i64;
        assert!((se - expected).abs() <= 5, "expiry off by {}", se - expected);
    }

    #[test]
    fn test_signature_verifies_against_key() {
        let expiry = 1_900_000_000;
        let token = sign_sas_token(RESOURCE_URI, &base64_key(), expiry).unwrap();
        let (_, sig, _) = parse_token(&token);

        let key = BASE64.decode(base64_key()).unwrap();
        let mut mac = HmacSha256::new_from_slice(&key).unwrap();
        mac.update(format!("{RESOURCE_URI}\n{expiry}").as_bytes());
        let expected = BASE64.encode(mac.finalize().into_bytes());

        assert_eq!(sig, expected);
    }

    #[test]
    fn test_undecodable_key_is_credential_error() {
        let result = sign_sas_token(RESOURCE_URI, "not!base64!!", 1_900_000_000);
        assert!(matches!(result, Err(AgentError::Credential(_))));
    }

    #[test]
    fn test_wire_format_is_exact() {
        let token = sign_sas_token(RESOURCE_URI, &base64_key(), 42).unwrap();
        assert!(token.starts_with(&format!("SharedAccessSignature sr={RESOURCE_URI}&sig=")));
        assert!(token.ends_with("&se=42"));
    }

    proptest! {
        #[test]
        fn prop_fields_always_parse_back(
            device in "[a-zA-Z0-9-]{1,32}",
            expiry in 0i64..4_000_000_000,
        ) {
            let uri = format!("hub.example.com/devices/{device}");
            let token = sign_sas_token(&uri, &base64_key(), expiry).unwrap();
            let (sr, _, se) = parse_token(&token);
            prop_assert_eq!(sr, uri);
            prop_assert_eq!(se, expiry);
        }
    }
}
