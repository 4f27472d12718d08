// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-slot refresh timer.
//!
//! Holds at most one pending wake-up, either single-shot or repeating.
//! Arming a new one cancels the old one, so two timers never coexist.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Shortest repeating period accepted; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Longest repeating period accepted. Keeps the first deadline within
/// `Instant` range.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Shape of the pending wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Once(Duration),
    Repeating(Duration),
}

struct Armed {
    kind: TimerKind,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the one pending refresh wake-up. Must be used inside a tokio runtime.
#[derive(Default)]
pub struct RefreshTimer {
    slot: Option<Armed>,
}

impl RefreshTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `on_fire` once after `delay`, replacing any pending timer.
    pub fn schedule<F>(&mut self, delay: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel_all();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => on_fire(),
            }
        });
        self.slot = Some(Armed { kind: TimerKind::Once(delay), cancel, handle });
    }

    /// Call `on_tick` every `interval` (first tick after one full interval),
    /// replacing any pending timer. `interval` is clamped to
    /// `[1ms, MAX_INTERVAL]`.
    pub fn schedule_repeating<F>(&mut self, interval: Duration, mut on_tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.cancel_all();
        let interval = interval.clamp(MIN_INTERVAL, MAX_INTERVAL);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => on_tick(),
                }
            }
        });
        self.slot = Some(Armed { kind: TimerKind::Repeating(interval), cancel, handle });
    }

    /// Cancel whatever is pending.
    pub fn cancel_all(&mut self) {
        if let Some(armed) = self.slot.take() {
            armed.cancel.cancel();
            armed.handle.abort();
        }
    }

    /// The pending wake-up, if one has not fired yet.
    pub fn pending(&self) -> Option<TimerKind> {
        self.slot.as_ref().filter(|armed| !armed.handle.is_finished()).map(|armed| armed.kind)
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
