// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! livedesk - live chat relay between website visitors and support agents.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod chat;
mod serve;
mod status;
mod tenant;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use livedesk_config::LivedeskConfig;

/// livedesk - live chat relay between website visitors and support agents.
#[derive(Parser, Debug)]
#[command(name = "livedesk", version, about, long_about = None)]
struct Cli {
    /// Explicit config file (replaces the XDG lookup; env overrides still apply).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay server.
    Serve,
    /// Provision tenants.
    Tenant {
        #[command(subcommand)]
        action: tenant::TenantCommand,
    },
    /// Chat as a visitor from the terminal.
    Chat {
        /// Widget key of the tenant to talk to.
        #[arg(long)]
        key: String,
        /// Relay base URL (defaults to server.public_url).
        #[arg(long)]
        server: Option<String>,
    },
    /// Query a running relay's health endpoint.
    Status {
        /// Output JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> LivedeskConfig {
    let loaded = match path {
        Some(path) => livedesk_config::load_and_validate_path(path),
        None => livedesk_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            livedesk_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("livedesk={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => {
            init_tracing(&config.server.log_level);
            serve::run_serve(config).await
        }
        Some(Commands::Tenant { action }) => {
            init_tracing("warn");
            tenant::run_tenant(&config, action).await
        }
        Some(Commands::Chat { key, server }) => {
            init_tracing("warn");
            chat::run_chat(&config, &key, server.as_deref()).await
        }
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        None => {
            println!("livedesk: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
