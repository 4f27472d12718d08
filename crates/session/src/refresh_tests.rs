// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use super::*;

struct MockServer {
    addr: SocketAddr,
    calls: Arc<AtomicU32>,
    bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl MockServer {
    fn url(&self) -> String {
        format!("http://{}/api/auth/refresh", self.addr)
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

/// Refresh endpoint that plays `responses` in order, repeating the last.
async fn mock_refresh_server(responses: Vec<(u16, String)>) -> anyhow::Result<MockServer> {
    let calls = Arc::new(AtomicU32::new(0));
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let responses = Arc::new(responses);

    let count = Arc::clone(&calls);
    let seen = Arc::clone(&bodies);
    let app = Router::new().route(
        "/api/auth/refresh",
        post(move |body: String| {
            let count = Arc::clone(&count);
            let seen = Arc::clone(&seen);
            let resps = Arc::clone(&responses);
            async move {
                let idx = count.fetch_add(1, Ordering::Relaxed) as usize;
                if let Ok(json) = serde_json::from_str(&body) {
                    seen.lock().push(json);
                }
                let (status, body) = resps
                    .get(idx)
                    .or_else(|| resps.last())
                    .cloned()
                    .unwrap_or((500, "{}".to_owned()));
                (
                    axum::http::StatusCode::from_u16(status)
                        .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR),
                    body,
                )
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(MockServer { addr, calls, bodies })
}

#[tokio::test]
async fn posts_refresh_token_and_reads_camel_case_grant() -> anyhow::Result<()> {
    let body = serde_json::json!({ "accessToken": "new-access", "refreshToken": "new-refresh" });
    let server = mock_refresh_server(vec![(200, body.to_string())]).await?;
    let refresher = HttpRefresher::new(server.url(), 2)?;
    assert_eq!(refresher.url(), server.url());

    let grant = refresher.refresh("old-refresh").await?;

    assert_eq!(grant.access_token, "new-access");
    assert_eq!(grant.refresh_token.as_deref(), Some("new-refresh"));
    assert_eq!(
        server.bodies.lock().clone(),
        vec![serde_json::json!({ "refresh_token": "old-refresh" })]
    );
    Ok(())
}

#[tokio::test]
async fn snake_case_grant_without_rotation() -> anyhow::Result<()> {
    let body = serde_json::json!({ "access_token": "new-access", "expires_in": 900 });
    let server = mock_refresh_server(vec![(200, body.to_string())]).await?;
    let refresher = HttpRefresher::new(server.url(), 2)?;

    let grant = refresher.refresh("old-refresh").await?;

    assert_eq!(grant, TokenGrant { access_token: "new-access".to_owned(), refresh_token: None });
    Ok(())
}

#[tokio::test]
async fn rejected_statuses_are_not_retried() -> anyhow::Result<()> {
    for status in [400u16, 401, 403] {
        let body = r#"{"error":"invalid_grant"}"#.to_owned();
        let server = mock_refresh_server(vec![(status, body.clone())]).await?;
        let refresher = HttpRefresher::new(server.url(), 2)?;

        let err = refresher.refresh("dead-refresh").await.err();

        assert_eq!(err, Some(RefreshError::Rejected { status, body }));
        assert_eq!(server.calls(), 1, "status {status}");
    }
    Ok(())
}

#[tokio::test]
async fn server_error_is_retried_with_backoff() -> anyhow::Result<()> {
    let ok = serde_json::json!({ "access_token": "new-access" }).to_string();
    let server = mock_refresh_server(vec![(503, "busy".to_owned()), (200, ok)]).await?;
    let refresher = HttpRefresher::new(server.url(), 2)?;

    let grant = refresher.refresh("old-refresh").await?;

    assert_eq!(grant.access_token, "new-access");
    assert_eq!(server.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn server_error_surfaces_once_retries_exhausted() -> anyhow::Result<()> {
    let server = mock_refresh_server(vec![(502, "bad gateway".to_owned())]).await?;
    let refresher = HttpRefresher::new(server.url(), 0)?;

    let err = refresher.refresh("old-refresh").await.err();

    assert_eq!(err, Some(RefreshError::Server { status: 502, body: "bad gateway".to_owned() }));
    assert_eq!(server.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn malformed_success_body_is_invalid_response() -> anyhow::Result<()> {
    for body in ["<html>oops</html>", r#"{"refresh_token":"r"}"#, r#"{"access_token":""}"#] {
        let server = mock_refresh_server(vec![(200, body.to_owned())]).await?;
        let refresher = HttpRefresher::new(server.url(), 2)?;

        let err = refresher.refresh("old-refresh").await.err();

        assert!(matches!(err, Some(RefreshError::InvalidResponse(_))), "{body}: got {err:?}");
        assert_eq!(server.calls(), 1);
    }
    Ok(())
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() -> anyhow::Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    let refresher = HttpRefresher::new(format!("http://{addr}/api/auth/refresh"), 0)?;

    let err = refresher.refresh("old-refresh").await.err();

    assert!(matches!(err, Some(RefreshError::Transport(_))), "got {err:?}");
    Ok(())
}
