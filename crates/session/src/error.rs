// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Why an access token payload could not be decoded.
///
/// Decoding never fails the caller; this only records the reason an empty
/// result was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Token was absent or empty.
    MissingToken,
    /// Token has no second `.`-delimited segment.
    MissingPayload,
    InvalidBase64(String),
    InvalidUtf8,
    /// Payload is not a JSON object with numeric `exp`/`iat`.
    InvalidJson(String),
}

impl DecodeError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingToken => "MISSING_TOKEN",
            Self::MissingPayload => "MISSING_PAYLOAD",
            Self::InvalidBase64(_) => "INVALID_BASE64",
            Self::InvalidUtf8 => "INVALID_UTF8",
            Self::InvalidJson(_) => "INVALID_JSON",
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingToken => f.write_str("token is missing"),
            Self::MissingPayload => f.write_str("token has no payload segment"),
            Self::InvalidBase64(e) => write!(f, "payload is not valid base64: {e}"),
            Self::InvalidUtf8 => f.write_str("payload is not valid UTF-8"),
            Self::InvalidJson(e) => write!(f, "payload is not a valid claims object: {e}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Failure of a single refresh exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The backend refused the refresh credential (400/401/403).
    Rejected { status: u16, body: String },
    /// The backend answered with any other non-success status.
    Server { status: u16, body: String },
    /// The request never got an HTTP answer.
    Transport(String),
    /// The backend answered 2xx with a body that is not a token grant.
    InvalidResponse(String),
}

impl RefreshError {
    /// A rejected credential will not start working on retry.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Transport(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "REFRESH_REJECTED",
            Self::Server { .. } => "SERVER_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::InvalidResponse(_) => "INVALID_RESPONSE",
        }
    }
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { status, body } => write!(f, "refresh rejected ({status}): {body}"),
            Self::Server { status, body } => write!(f, "refresh failed ({status}): {body}"),
            Self::Transport(e) => write!(f, "refresh request failed: {e}"),
            Self::InvalidResponse(e) => write!(f, "invalid refresh response: {e}"),
        }
    }
}

impl std::error::Error for RefreshError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
