// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events emitted over the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn { session: Uuid },
    LoggedOut {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<Uuid>,
    },
    /// A refresh stored a new access token.
    Refreshed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<Uuid>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_in_secs: Option<i64>,
    },
    /// A refresh failed. The keeper does not act on this; the interceptor does.
    #[serde(rename = "refresh:failed")]
    RefreshFailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<Uuid>,
        error: String,
        /// The backend refused the refresh credential.
        rejected: bool,
    },
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
