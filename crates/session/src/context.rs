// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application-level auth handle: one session, its permission evaluator, and
//! the keeper that refreshes it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::events::SessionEvent;
use crate::keeper::{KeeperConfig, TokenKeeper};
use crate::permission::PermissionEvaluator;
use crate::refresh::TokenRefresher;
use crate::session::{LoginGrant, SessionStore};

/// Owns the session context and drives the keeper through login and logout.
pub struct AuthContext {
    session: Arc<SessionStore>,
    permissions: PermissionEvaluator,
    keeper: Arc<TokenKeeper>,
    event_tx: broadcast::Sender<SessionEvent>,
    shutdown: CancellationToken,
}

impl AuthContext {
    pub fn new(
        session: Arc<SessionStore>,
        refresher: Arc<dyn TokenRefresher>,
        clock: Arc<dyn Clock>,
        config: KeeperConfig,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);
        let keeper =
            TokenKeeper::new(Arc::clone(&session), refresher, clock, config, event_tx.clone());
        Arc::new(Self {
            permissions: PermissionEvaluator::new(Arc::clone(&session)),
            session,
            keeper,
            event_tx,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn permissions(&self) -> &PermissionEvaluator {
        &self.permissions
    }

    pub fn keeper(&self) -> &Arc<TokenKeeper> {
        &self.keeper
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Start a new session and begin keeping it fresh.
    pub fn login(&self, grant: LoginGrant) -> anyhow::Result<()> {
        let id = self.session.login(grant)?;
        let _ = self.event_tx.send(SessionEvent::LoggedIn { session: id });
        self.keeper.activate();
        Ok(())
    }

    /// End the session. Pending refresh timers are cancelled before this
    /// returns.
    pub fn logout(&self) {
        let id = self.session.session_id();
        self.session.logout();
        self.keeper.deactivate();
        let _ = self.event_tx.send(SessionEvent::LoggedOut { session: id });
    }

    /// Pick up a session restored from storage. Returns whether one exists.
    pub fn resume(&self) -> bool {
        if !self.session.is_authenticated() {
            return false;
        }
        self.keeper.activate();
        true
    }

    /// Tear down: cancel timers and stop background tasks. The session itself
    /// is left intact (and persisted) for the next start.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.keeper.deactivate();
    }
}

/// Spawn the interceptor that reacts to refresh failures.
///
/// A rejected refresh credential ends the session. Any other failure is
/// retried by re-activating the keeper after `retry_after`, provided the
/// same session is still logged in.
pub fn spawn_failure_interceptor(ctx: Arc<AuthContext>, retry_after: Duration) -> JoinHandle<()> {
    let mut event_rx = ctx.subscribe();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = ctx.shutdown.cancelled() => break,
                event = event_rx.recv() => event,
            };
            let event = match event {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "interceptor lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let SessionEvent::RefreshFailed { session, error, rejected } = event else {
                continue;
            };
            if session != ctx.session.session_id() {
                tracing::debug!(?session, "ignoring refresh failure from an ended session");
                continue;
            }

            if rejected {
                tracing::warn!(?session, err = %error, "refresh credential rejected, ending session");
                ctx.logout();
            } else {
                tracing::info!(
                    ?session,
                    retry_in_secs = retry_after.as_secs(),
                    "refresh failed, will retry"
                );
                spawn_retry(Arc::clone(&ctx), session, retry_after);
            }
        }
    })
}

fn spawn_retry(ctx: Arc<AuthContext>, session: Option<uuid::Uuid>, retry_after: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = ctx.shutdown.cancelled() => {}
            _ = tokio::time::sleep(retry_after) => {
                if ctx.session.session_id() == session && ctx.session.is_authenticated() {
                    ctx.keeper.activate();
                }
            }
        }
    });
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
