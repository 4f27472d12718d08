// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use staffdesk_session::command;
use staffdesk_session::config::{Cli, SessionConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.config.validate(&cli.command) {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&cli.config);

    match command::run(&cli.config, cli.command).await {
        Ok(output) => {
            if let Some(body) = output.body {
                match serde_json::to_string_pretty(&body) {
                    Ok(text) => println!("{text}"),
                    Err(e) => error!("failed to render output: {e}"),
                }
            }
            std::process::exit(output.code);
        }
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(config: &SessionConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}
