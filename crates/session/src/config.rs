// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use crate::keeper::KeeperConfig;
use crate::timer::MAX_INTERVAL;

/// Command-line front end for the session tooling.
#[derive(Debug, clap::Parser)]
#[command(name = "staffdesk-session", version, about = "Inspect and keep alive a staffdesk login session")]
pub struct Cli {
    #[command(flatten)]
    pub config: SessionConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
    /// Store a session from tokens issued by the backend.
    Login {
        #[arg(long, env = "STAFFDESK_ACCESS_TOKEN")]
        access_token: String,
        #[arg(long, env = "STAFFDESK_REFRESH_TOKEN")]
        refresh_token: String,
        /// Permission name held by the user (repeatable).
        #[arg(long = "permission")]
        permissions: Vec<String>,
        /// Role held by the user (repeatable); `admin` grants every permission.
        #[arg(long = "role")]
        roles: Vec<String>,
    },
    /// Clear the stored session.
    Logout,
    /// Print the stored session as JSON.
    Status,
    /// Decode an access token payload.
    Decode { token: String },
    /// Evaluate a permission requirement; exits 1 when denied.
    Check {
        /// Require every listed permission instead of any one.
        #[arg(long)]
        all: bool,
        /// Only administrators pass.
        #[arg(long)]
        admin_only: bool,
        permissions: Vec<String>,
    },
    /// Keep the stored session fresh until interrupted or invalidated.
    Watch,
}

/// Shared settings for all subcommands.
#[derive(Debug, Clone, clap::Args)]
pub struct SessionConfig {
    /// Directory holding `session.json`. Defaults to the XDG state dir.
    #[arg(long, global = true, env = "STAFFDESK_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Backend endpoint that exchanges a refresh token for a new access token.
    #[arg(long, global = true, env = "STAFFDESK_REFRESH_URL")]
    pub refresh_url: Option<String>,

    /// Refresh this many seconds before the access token expires.
    #[arg(long, global = true, default_value_t = 120, env = "STAFFDESK_REFRESH_BUFFER_SECS")]
    pub refresh_buffer_secs: u64,

    /// Periodic refresh interval when token expiry is unknown.
    #[arg(long, global = true, default_value_t = 240, env = "STAFFDESK_FALLBACK_INTERVAL_SECS")]
    pub fallback_interval_secs: u64,

    /// Margin used by `status` to report a token as expiring soon.
    #[arg(long, global = true, default_value_t = 60, env = "STAFFDESK_EXPIRING_SOON_SECS")]
    pub expiring_soon_secs: u64,

    /// Delay before retrying after a transient refresh failure.
    #[arg(long, global = true, default_value_t = 60, env = "STAFFDESK_RETRY_AFTER_SECS")]
    pub retry_after_secs: u64,

    /// Retries per refresh exchange for transient failures.
    #[arg(long, global = true, default_value_t = 2, env = "STAFFDESK_MAX_RETRIES")]
    pub max_retries: u32,

    /// Log filter (tracing `EnvFilter` syntax).
    #[arg(long, global = true, default_value = "info", env = "STAFFDESK_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: `text` or `json`.
    #[arg(long, global = true, default_value = "text", env = "STAFFDESK_LOG_FORMAT")]
    pub log_format: String,
}

impl SessionConfig {
    pub fn validate(&self, command: &Command) -> anyhow::Result<()> {
        if self.refresh_buffer_secs == 0 {
            anyhow::bail!("--refresh-buffer-secs must be greater than zero");
        }
        if self.fallback_interval_secs == 0 {
            anyhow::bail!("--fallback-interval-secs must be greater than zero");
        }
        for (flag, secs) in [
            ("--refresh-buffer-secs", self.refresh_buffer_secs),
            ("--fallback-interval-secs", self.fallback_interval_secs),
            ("--retry-after-secs", self.retry_after_secs),
        ] {
            if secs > MAX_INTERVAL.as_secs() {
                anyhow::bail!("{flag} must be at most {} seconds", MAX_INTERVAL.as_secs());
            }
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            anyhow::bail!("--log-format must be `text` or `json`, got `{}`", self.log_format);
        }
        if matches!(command, Command::Watch) && self.refresh_url.is_none() {
            anyhow::bail!("watch requires --refresh-url");
        }
        Ok(())
    }

    pub fn session_path(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(crate::storage::state_dir).join("session.json")
    }

    pub fn keeper_config(&self) -> KeeperConfig {
        KeeperConfig {
            refresh_buffer: Duration::from_secs(self.refresh_buffer_secs),
            fallback_interval: Duration::from_secs(self.fallback_interval_secs),
        }
    }

    pub fn retry_after(&self) -> Duration {
        Duration::from_secs(self.retry_after_secs)
    }

    pub fn expiring_soon_secs(&self) -> i64 {
        i64::try_from(self.expiring_soon_secs).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
