// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access token payload decoding and expiry math.
//!
//! Only the middle (payload) segment of a `header.payload.signature` token is
//! read. Signatures are never verified here; the backend does that.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DecodeError;

/// Default margin for [`is_token_expiring_soon`].
pub const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 60;

/// Claims read from an access token payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Expiry as epoch seconds.
    #[serde(default, deserialize_with = "epoch_secs_opt", skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issued-at as epoch seconds.
    #[serde(default, deserialize_with = "epoch_secs_opt", skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Everything else the issuer put in the payload.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenClaims {
    pub fn is_empty(&self) -> bool {
        self.exp.is_none() && self.iat.is_none() && self.extra.is_empty()
    }
}

/// Accept integral or fractional epoch seconds; fractions are truncated.
fn epoch_secs_opt<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number.and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))))
}

/// Decode the payload segment of `token`.
pub fn decode_token(token: Option<&str>) -> Result<TokenClaims, DecodeError> {
    let token = token.filter(|t| !t.is_empty()).ok_or(DecodeError::MissingToken)?;
    let payload = token.split('.').nth(1).ok_or(DecodeError::MissingPayload)?;
    if payload.is_empty() {
        return Err(DecodeError::MissingPayload);
    }

    let bytes = STANDARD
        .decode(to_standard_alphabet(payload))
        .map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;
    let json = String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
    serde_json::from_str(&json).map_err(|e| DecodeError::InvalidJson(e.to_string()))
}

/// Decode `token`, falling back to empty claims on any malformed input.
pub fn claims_or_default(token: Option<&str>) -> TokenClaims {
    match decode_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(reason = e.as_str(), err = %e, "token payload not decodable");
            TokenClaims::default()
        }
    }
}

/// Whether `token` expires within `buffer_secs` of `now`.
///
/// An absent token counts as expiring. A token whose expiry cannot be read
/// does not: unknown expiry is not the same as expired.
pub fn is_token_expiring_soon(token: Option<&str>, buffer_secs: i64, now: i64) -> bool {
    if token.map_or(true, str::is_empty) {
        return true;
    }
    match claims_or_default(token).exp {
        Some(exp) => exp.saturating_sub(now) < buffer_secs,
        None => false,
    }
}

/// Seconds until `token` expires (negative once expired), if known.
/// Saturates at the `i64` range for out-of-range `exp` claims.
pub fn token_expiry_time(token: Option<&str>, now: i64) -> Option<i64> {
    if token.map_or(true, str::is_empty) {
        return None;
    }
    claims_or_default(token).exp.map(|exp| exp.saturating_sub(now))
}

/// Map the URL-safe alphabet onto the standard one and restore padding.
fn to_standard_alphabet(segment: &str) -> String {
    let mut out: String = segment
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    while out.len() % 4 != 0 {
        out.push('=');
    }
    out
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
