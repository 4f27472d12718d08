// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access token refresh exchange.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RefreshError;

/// Tokens returned by a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    /// Present when the backend rotates the refresh credential.
    #[serde(default, alias = "refreshToken", skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Exchanges a refresh credential for a new access token.
pub trait TokenRefresher: Send + Sync {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenGrant, RefreshError>> + Send + 'a>>;
}

/// Initial retry backoff for transient refresh failures.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Maximum retry backoff for transient refresh failures.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Refreshes against the backend's JSON refresh endpoint.
pub struct HttpRefresher {
    http: reqwest::Client,
    url: String,
    max_retries: u32,
}

impl HttpRefresher {
    pub fn new(url: impl Into<String>, max_retries: u32) -> anyhow::Result<Self> {
        crate::crypto::ensure_provider();
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { http, url: url.into(), max_retries })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TokenRefresher for HttpRefresher {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenGrant, RefreshError>> + Send + 'a>> {
        Box::pin(refresh_with_retries(&self.http, &self.url, refresh_token, self.max_retries))
    }
}

/// Perform a single refresh request.
pub async fn do_refresh(
    client: &reqwest::Client,
    url: &str,
    refresh_token: &str,
) -> Result<TokenGrant, RefreshError> {
    let resp = client
        .post(url)
        .json(&serde_json::json!({ "refresh_token": refresh_token }))
        .send()
        .await
        .map_err(|e| RefreshError::Transport(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let status = status.as_u16();
        return Err(match status {
            400 | 401 | 403 => RefreshError::Rejected { status, body },
            _ => RefreshError::Server { status, body },
        });
    }

    let grant: TokenGrant =
        resp.json().await.map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
    if grant.access_token.is_empty() {
        return Err(RefreshError::InvalidResponse("empty access token".to_owned()));
    }
    Ok(grant)
}

/// Refresh with exponential backoff, retrying only transient failures.
pub async fn refresh_with_retries(
    client: &reqwest::Client,
    url: &str,
    refresh_token: &str,
    max_retries: u32,
) -> Result<TokenGrant, RefreshError> {
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 0;
    loop {
        match do_refresh(client, url, refresh_token).await {
            Ok(grant) => return Ok(grant),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                tracing::debug!(attempt, err = %e, "refresh attempt failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
