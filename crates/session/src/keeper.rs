// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token keeper: proactive access token refresh.
//!
//! While the session is authenticated the keeper holds exactly one pending
//! wake-up, computed from the current access token's expiry:
//!
//! - expiring within the refresh buffer: refresh immediately;
//! - known expiry beyond the buffer: one-shot wake-up `buffer` seconds early;
//! - unknown expiry (or not beyond the buffer): repeating fallback wake-up.
//!
//! At most one refresh runs at a time. Triggers that arrive while one is in
//! flight are dropped. A completed refresh reschedules from the new token; a
//! failed one is surfaced as [`SessionEvent::RefreshFailed`] and nothing is
//! rescheduled here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::clock::Clock;
use crate::error::RefreshError;
use crate::events::SessionEvent;
use crate::refresh::TokenRefresher;
use crate::session::SessionStore;
use crate::timer::{RefreshTimer, TimerKind};
use crate::token;

/// Refresh this long before the access token expires.
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(120);

/// Periodic refresh used when the token's expiry cannot be scheduled against.
pub const DEFAULT_FALLBACK_INTERVAL: Duration = Duration::from_secs(240);

/// Timing knobs. The two values are independent of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeeperConfig {
    pub refresh_buffer: Duration,
    pub fallback_interval: Duration,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self { refresh_buffer: DEFAULT_REFRESH_BUFFER, fallback_interval: DEFAULT_FALLBACK_INTERVAL }
    }
}

/// Result of one refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New tokens were stored and the next wake-up scheduled.
    Refreshed,
    /// Nothing was attempted: another refresh was in flight, or the session
    /// was not authenticated.
    Skipped,
    /// The exchange finished after the session it belonged to had ended.
    Discarded,
    Failed(RefreshError),
}

/// Clears the in-flight flag when dropped, on every exit path.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Keeps the session's access token fresh.
pub struct TokenKeeper {
    session: Arc<SessionStore>,
    refresher: Arc<dyn TokenRefresher>,
    clock: Arc<dyn Clock>,
    config: KeeperConfig,
    timer: Mutex<RefreshTimer>,
    in_flight: Arc<AtomicBool>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl TokenKeeper {
    pub fn new(
        session: Arc<SessionStore>,
        refresher: Arc<dyn TokenRefresher>,
        clock: Arc<dyn Clock>,
        config: KeeperConfig,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            session,
            refresher,
            clock,
            config,
            timer: Mutex::new(RefreshTimer::new()),
            in_flight: Arc::new(AtomicBool::new(false)),
            event_tx,
        })
    }

    pub fn config(&self) -> KeeperConfig {
        self.config
    }

    /// Start keeping the current session fresh.
    ///
    /// Refreshes right away when the token is already inside the refresh
    /// buffer; otherwise arms the next wake-up. Without an authenticated
    /// session this only cancels pending timers.
    pub fn activate(self: &Arc<Self>) {
        if !self.session.is_authenticated() {
            self.deactivate();
            return;
        }
        let access = self.session.access_token();
        let now = self.clock.now_secs();
        if token::is_token_expiring_soon(access.as_deref(), self.buffer_secs(), now) {
            tracing::info!(
                session = ?self.session.session_id(),
                "access token expiring soon, refreshing now"
            );
            self.timer.lock().cancel_all();
            self.trigger();
        } else {
            self.reschedule();
        }
    }

    /// Cancel every pending wake-up.
    ///
    /// A refresh already in flight runs to completion, but its result is
    /// discarded if the session it belonged to has ended.
    pub fn deactivate(&self) {
        self.timer.lock().cancel_all();
        tracing::debug!("token keeper deactivated");
    }

    /// Start a refresh in the background. Returns false if the trigger was
    /// dropped because a refresh is already in flight or there is no session.
    pub fn trigger(self: &Arc<Self>) -> bool {
        if !self.session.is_authenticated() {
            tracing::debug!("no authenticated session, ignoring refresh trigger");
            return false;
        }
        let Some(guard) = self.begin() else {
            tracing::debug!("refresh already in flight, dropping trigger");
            return false;
        };
        let keeper = Arc::clone(self);
        tokio::spawn(async move {
            keeper.run_refresh(guard).await;
        });
        true
    }

    /// Refresh now and wait for the result.
    pub async fn refresh_now(self: &Arc<Self>) -> RefreshOutcome {
        let Some(guard) = self.begin() else {
            tracing::debug!("refresh already in flight, dropping request");
            return RefreshOutcome::Skipped;
        };
        self.run_refresh(guard).await
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn pending_timer(&self) -> Option<TimerKind> {
        self.timer.lock().pending()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    fn begin(&self) -> Option<InFlight> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(Arc::clone(&self.in_flight)))
    }

    async fn run_refresh(self: &Arc<Self>, guard: InFlight) -> RefreshOutcome {
        let outcome = self.exchange().await;
        drop(guard);

        match outcome {
            RefreshOutcome::Refreshed => self.reschedule(),
            // A different login took over while the exchange ran; keep that
            // session fresh instead.
            RefreshOutcome::Discarded if self.session.is_authenticated() => self.activate(),
            _ => {}
        }
        outcome
    }

    async fn exchange(&self) -> RefreshOutcome {
        let generation = self.session.generation();
        let session_id = self.session.session_id();
        let refresh_token = match self.session.refresh_token() {
            Some(rt) if self.session.is_authenticated() => rt,
            _ => {
                tracing::debug!("no authenticated session, skipping refresh");
                return RefreshOutcome::Skipped;
            }
        };

        match self.refresher.refresh(&refresh_token).await {
            Ok(grant) => {
                if !self.session.apply_refresh(generation, &grant) {
                    tracing::info!(session = ?session_id, "session ended during refresh, discarding tokens");
                    return RefreshOutcome::Discarded;
                }
                let expires_in =
                    token::token_expiry_time(Some(&grant.access_token), self.clock.now_secs());
                tracing::info!(session = ?session_id, expires_in, "access token refreshed");
                let _ = self.event_tx.send(SessionEvent::Refreshed {
                    session: session_id,
                    expires_in_secs: expires_in,
                });
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                if self.session.generation() != generation {
                    tracing::info!(session = ?session_id, err = %e, "refresh failed after session ended");
                    return RefreshOutcome::Discarded;
                }
                tracing::warn!(session = ?session_id, err = %e, "access token refresh failed");
                let _ = self.event_tx.send(SessionEvent::RefreshFailed {
                    session: session_id,
                    error: e.to_string(),
                    rejected: e.is_rejected(),
                });
                RefreshOutcome::Failed(e)
            }
        }
    }

    /// Arm the next wake-up from the current token. Ignored without an
    /// authenticated session.
    fn reschedule(self: &Arc<Self>) {
        if !self.session.is_authenticated() {
            tracing::debug!("no authenticated session, ignoring reschedule");
            return;
        }
        let access = self.session.access_token();
        let expires_in = token::token_expiry_time(access.as_deref(), self.clock.now_secs());
        let buffer = self.buffer_secs();
        let weak = Arc::downgrade(self);

        let mut timer = self.timer.lock();
        match expires_in {
            Some(secs) if secs > buffer => {
                let delay = Duration::from_secs(u64::try_from(secs - buffer).unwrap_or_default());
                tracing::debug!(delay_secs = delay.as_secs(), "next token refresh scheduled");
                timer.schedule(delay, move || fire(&weak));
            }
            _ => {
                let interval = self.config.fallback_interval;
                tracing::debug!(
                    expires_in,
                    interval_secs = interval.as_secs(),
                    "token expiry not schedulable, refreshing periodically"
                );
                timer.schedule_repeating(interval, move || fire(&weak));
            }
        }
    }

    fn buffer_secs(&self) -> i64 {
        i64::try_from(self.config.refresh_buffer.as_secs()).unwrap_or(i64::MAX)
    }
}

/// Timer callback. Holds only a weak reference so a dropped keeper never
/// refreshes.
fn fire(keeper: &Weak<TokenKeeper>) {
    if let Some(keeper) = keeper.upgrade() {
        keeper.trigger();
    }
}

#[cfg(test)]
#[path = "keeper_tests.rs"]
mod tests;
