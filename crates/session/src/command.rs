// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands over a file-backed session.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{Command, SessionConfig};
use crate::context::{spawn_failure_interceptor, AuthContext};
use crate::events::SessionEvent;
use crate::permission::{PermissionEvaluator, PermissionRequirement};
use crate::refresh::HttpRefresher;
use crate::session::{LoginGrant, SessionStore};
use crate::storage::FileStorage;
use crate::token;

/// Result of a subcommand: process exit code plus an optional JSON body for
/// stdout.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub code: i32,
    pub body: Option<serde_json::Value>,
}

impl CommandOutput {
    fn ok(body: serde_json::Value) -> Self {
        Self { code: 0, body: Some(body) }
    }
}

pub async fn run(config: &SessionConfig, command: Command) -> anyhow::Result<CommandOutput> {
    match command {
        Command::Login { access_token, refresh_token, permissions, roles } => {
            login(config, LoginGrant { access_token, refresh_token, permissions, roles })
        }
        Command::Logout => logout(config),
        Command::Status => status(config, &SystemClock),
        Command::Decode { token } => Ok(decode(&token)),
        Command::Check { all, admin_only, permissions } => {
            let requirement = PermissionRequirement { permissions, require_all: all, admin_only };
            check(config, &requirement)
        }
        Command::Watch => watch(config).await,
    }
}

fn open_session(config: &SessionConfig) -> anyhow::Result<Arc<SessionStore>> {
    let storage = FileStorage::open(config.session_path())?;
    Ok(SessionStore::restore(Arc::new(storage)))
}

pub fn login(config: &SessionConfig, grant: LoginGrant) -> anyhow::Result<CommandOutput> {
    let storage = FileStorage::open(config.session_path())?;
    let session = SessionStore::new(Arc::new(storage));
    let id = session.login(grant)?;
    info!(session = %id, "session stored");
    Ok(CommandOutput::ok(json!({ "session_id": id })))
}

pub fn logout(config: &SessionConfig) -> anyhow::Result<CommandOutput> {
    let session = open_session(config)?;
    let was_authenticated = session.is_authenticated();
    session.logout();
    Ok(CommandOutput::ok(json!({ "logged_out": was_authenticated })))
}

pub fn status(config: &SessionConfig, clock: &dyn Clock) -> anyhow::Result<CommandOutput> {
    let session = open_session(config)?;
    let snapshot = session.snapshot(clock.now_secs(), config.expiring_soon_secs());
    Ok(CommandOutput::ok(serde_json::to_value(snapshot)?))
}

pub fn decode(access_token: &str) -> CommandOutput {
    match token::decode_token(Some(access_token)) {
        Ok(claims) => CommandOutput {
            code: 0,
            body: serde_json::to_value(claims).ok(),
        },
        Err(e) => CommandOutput {
            code: 1,
            body: Some(json!({ "error": e.as_str(), "message": e.to_string() })),
        },
    }
}

/// Exit code 0 when granted, 1 when denied.
pub fn check(
    config: &SessionConfig,
    requirement: &PermissionRequirement,
) -> anyhow::Result<CommandOutput> {
    let evaluator = PermissionEvaluator::new(open_session(config)?);
    let allowed = evaluator.check(requirement);
    Ok(CommandOutput { code: if allowed { 0 } else { 1 }, body: Some(json!({ "allowed": allowed })) })
}

/// Keep the stored session fresh, printing session events as JSON lines,
/// until interrupted (exit 0) or the session ends (exit 1).
async fn watch(config: &SessionConfig) -> anyhow::Result<CommandOutput> {
    let url = config
        .refresh_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("watch requires --refresh-url"))?;
    let storage = Arc::new(FileStorage::open(config.session_path())?);
    let path = storage.path().to_path_buf();
    let session = SessionStore::restore(storage);
    let refresher = HttpRefresher::new(url, config.max_retries)?;
    info!(url = refresher.url(), "using refresh endpoint");
    let ctx = AuthContext::new(
        session,
        Arc::new(refresher),
        Arc::new(SystemClock),
        config.keeper_config(),
    );
    let mut events = ctx.subscribe();
    let interceptor = spawn_failure_interceptor(Arc::clone(&ctx), config.retry_after());

    if !ctx.resume() {
        ctx.shutdown();
        anyhow::bail!("no stored session, run `login` first");
    }
    info!(path = %path.display(), "watching session");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let code = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break 0;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Ok(line) = serde_json::to_string(&event) {
                        println!("{line}");
                    }
                    if let SessionEvent::LoggedOut { .. } = event {
                        warn!("session ended");
                        break 1;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break 1,
            },
        }
    };

    ctx.shutdown();
    if let Err(e) = interceptor.await {
        warn!(err = %e, "interceptor task failed");
    }
    Ok(CommandOutput { code, body: None })
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
