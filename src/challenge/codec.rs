//! Challenge Codec
//!
//! Record → compact JSON → UTF-8 → base64 (URL-safe, unpadded), and back.
//! Decoding also accepts the standard alphabet, padding, and `+` turned into
//! a space by form decoding, since older links were made that way.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;
use tracing::debug;

use crate::challenge::record::{ChallengeRecord, WireChallenge};

/// Challenge encode/decode errors. Never fatal; a bad link just means a
/// normal start.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChallengeError {
    /// Token is not base64.
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    /// Decoded bytes are not UTF-8.
    #[error("payload is not UTF-8")]
    InvalidUtf8,

    /// Payload is not the expected JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Payload is JSON but not an object.
    #[error("payload is a JSON {0}, expected an object")]
    NotAnObject(&'static str),

    /// Required field absent (or falsy).
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Payload declares a schema this build does not know.
    #[error("unsupported challenge version {0}")]
    UnsupportedVersion(String),

    /// Nothing to encode: no photo location yet.
    #[error("no photo location to share")]
    NoLocation,
}

/// Compact JSON body of a record.
pub fn challenge_json(record: &ChallengeRecord) -> Result<String, ChallengeError> {
    serde_json::to_string(&record.to_wire()).map_err(|e| ChallengeError::InvalidJson(e.to_string()))
}

/// Encode a record as a URL-safe token.
pub fn encode_challenge(record: &ChallengeRecord) -> Result<String, ChallengeError> {
    let json = challenge_json(record)?;
    Ok(URL_SAFE_NO_PAD.encode(json.as_bytes()))
}

/// Decode a token produced by [`encode_challenge`] or by older clients.
pub fn decode_challenge(token: &str) -> Result<ChallengeRecord, ChallengeError> {
    let bytes = decode_token_bytes(token)?;
    let text = String::from_utf8(bytes).map_err(|_| ChallengeError::InvalidUtf8)?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| ChallengeError::InvalidJson(e.to_string()))?;

    let wire = WireChallenge::from_value(value)?;
    debug!("Challenge payload is v{}", wire.version());
    wire.into_record()
}

fn decode_token_bytes(token: &str) -> Result<Vec<u8>, ChallengeError> {
    let normalized: String = token
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' | ' ' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    if normalized.is_empty() {
        return Err(ChallengeError::InvalidBase64("empty token".into()));
    }

    URL_SAFE_NO_PAD
        .decode(normalized.as_bytes())
        .map_err(|e| ChallengeError::InvalidBase64(e.to_string()))
}
