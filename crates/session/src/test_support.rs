// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: token builders, a scripted refresher, and
//! assertion helpers.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::error::RefreshError;
use crate::refresh::{TokenGrant, TokenRefresher};
use crate::session::LoginGrant;

/// Build an unsigned `header.payload.signature` token around `payload`.
pub fn encode_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.c2lnbmF0dXJl")
}

/// Token whose `exp` claim is `exp` (epoch seconds).
pub fn token_expiring_at(exp: i64) -> String {
    encode_token(&serde_json::json!({ "sub": "employee-7", "exp": exp, "iat": exp - 900 }))
}

/// Token that decodes but carries no `exp`.
pub fn token_without_expiry() -> String {
    encode_token(&serde_json::json!({ "sub": "employee-7" }))
}

/// Login grant with refresh credential `refresh-1`.
pub fn login_grant(access_token: &str, permissions: &[&str], roles: &[&str]) -> LoginGrant {
    LoginGrant {
        access_token: access_token.to_owned(),
        refresh_token: "refresh-1".to_owned(),
        permissions: permissions.iter().map(|p| (*p).to_owned()).collect(),
        roles: roles.iter().map(|r| (*r).to_owned()).collect(),
    }
}

/// Let spawned tasks run to their next suspension point.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Scripted [`TokenRefresher`] that records every call.
///
/// Scripted responses are served first; afterwards every call issues a token
/// expiring at `issue_exp` (or fails, if a failure was configured). A gated
/// refresher blocks each call until [`StubRefresher::release`] is called.
pub struct StubRefresher {
    calls: AtomicU32,
    seen: Mutex<Vec<String>>,
    script: Mutex<VecDeque<Result<TokenGrant, RefreshError>>>,
    failure: Option<RefreshError>,
    issue_exp: i64,
    gate: Option<Semaphore>,
}

impl StubRefresher {
    /// Issues tokens expiring at `issue_exp`, rotating the refresh credential.
    pub fn issuing(issue_exp: i64) -> Self {
        Self {
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            failure: None,
            issue_exp,
            gate: None,
        }
    }

    /// Fails every unscripted call with `err`.
    pub fn failing(err: RefreshError) -> Self {
        Self { failure: Some(err), ..Self::issuing(0) }
    }

    /// Block each call until released.
    pub fn gated(self) -> Self {
        Self { gate: Some(Semaphore::new(0)), ..self }
    }

    pub fn push(&self, response: Result<TokenGrant, RefreshError>) {
        self.script.lock().push_back(response);
    }

    /// Let `n` blocked (or future) calls complete.
    pub fn release(&self, n: usize) {
        if let Some(ref gate) = self.gate {
            gate.add_permits(n);
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh credentials presented, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl TokenRefresher for StubRefresher {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenGrant, RefreshError>> + Send + 'a>> {
        Box::pin(async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen.lock().push(refresh_token.to_owned());
            if let Some(ref gate) = self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            if let Some(response) = self.script.lock().pop_front() {
                return response;
            }
            match self.failure {
                Some(ref err) => Err(err.clone()),
                None => Ok(TokenGrant {
                    access_token: token_expiring_at(self.issue_exp),
                    refresh_token: Some(format!("refresh-{}", n + 1)),
                }),
            }
        })
    }
}

/// Assert that a `Result` is `Err` and its message contains `$substr`.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
