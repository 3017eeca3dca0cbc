//! Stored credential pair and structural token checks.
//!
//! The client never verifies signatures; it only decides whether a stored
//! value is worth sending to the backend at all.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access/refresh token pair as persisted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenDefect {
    #[error("token is empty")]
    Empty,

    #[error("token is a placeholder value ({0})")]
    Placeholder(String),

    #[error("token is malformed: {0}")]
    Malformed(&'static str),

    #[error("token expired at {0}")]
    Expired(DateTime<Utc>),
}

/// Values that end up in storage when a caller stringifies a missing token.
const PLACEHOLDERS: [&str; 5] = ["undefined", "null", "none", "nan", "[object object]"];

/// Registered time claims. NumericDate may carry a fractional part.
#[derive(Debug, Deserialize)]
struct TimeClaims {
    exp: Option<f64>,
    iat: Option<f64>,
}

/// Deterministically check whether a stored token is structurally usable.
///
/// A three-segment token whose header decodes to a JSON object is treated as
/// a JWS: its payload must be a base64url JSON object and its time window must
/// still be open at `now`. Any other value (opaque strings, JWE, PASETO) only
/// has to be made of token68 characters with no empty dot-separated segment.
pub fn inspect_token(raw: &str, now: DateTime<Utc>) -> Result<(), TokenDefect> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TokenDefect::Empty);
    }

    let lowered = trimmed.to_ascii_lowercase();
    if PLACEHOLDERS.contains(&lowered.as_str()) {
        return Err(TokenDefect::Placeholder(trimmed.to_string()));
    }

    if raw.chars().any(char::is_whitespace) {
        return Err(TokenDefect::Malformed("contains whitespace"));
    }

    let segments: Vec<&str> = raw.split('.').collect();
    if segments.len() == 3 && decode_json_object(segments[0]).is_some() {
        return inspect_jws(&segments, now);
    }

    if !raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-._~+/=".contains(c))
    {
        return Err(TokenDefect::Malformed("unexpected characters"));
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err(TokenDefect::Malformed("empty segment"));
    }
    Ok(())
}

fn inspect_jws(segments: &[&str], now: DateTime<Utc>) -> Result<(), TokenDefect> {
    if segments[1].is_empty() || segments[2].is_empty() {
        return Err(TokenDefect::Malformed("jwt has an empty segment"));
    }
    let payload = decode_json_object(segments[1])
        .ok_or(TokenDefect::Malformed("jwt payload is not a base64url JSON object"))?;
    let claims: TimeClaims = serde_json::from_value(payload)
        .map_err(|_| TokenDefect::Malformed("jwt time claims are not numeric"))?;

    check_time_window(&claims, now)
}

fn decode_json_object(segment: &str) -> Option<serde_json::Value> {
    let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    value.is_object().then_some(value)
}

fn check_time_window(claims: &TimeClaims, now: DateTime<Utc>) -> Result<(), TokenDefect> {
    let Some(exp) = claims.exp else {
        return Ok(());
    };
    let expires_at = DateTime::from_timestamp(exp.floor() as i64, 0)
        .ok_or(TokenDefect::Malformed("exp is out of range"))?;

    if let Some(iat) = claims.iat {
        if exp <= iat {
            return Err(TokenDefect::Malformed("expires before it was issued"));
        }
    }
    if now >= expires_at {
        return Err(TokenDefect::Expired(expires_at));
    }
    Ok(())
}
