// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `livedesk status` command implementation.
//!
//! Queries the relay's `/health` endpoint and prints whether it is up,
//! and how long it has been running.

use std::io::IsTerminal;
use std::time::Duration;

use livedesk_config::model::LivedeskConfig;
use livedesk_core::LivedeskError;
use serde::{Deserialize, Serialize};

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
    #[serde(default)]
    version: Option<String>,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub status: String,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub version: Option<String>,
    pub host: String,
    pub port: u16,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Run the `livedesk status` command.
///
/// `--json` prints structured output for scripting. `--plain`, or a
/// non-TTY stdout, disables colors.
pub async fn run_status(
    config: &LivedeskConfig,
    json: bool,
    plain: bool,
) -> Result<(), LivedeskError> {
    let host = &config.server.host;
    let port = config.server.port;
    let url = format!("http://{host}:{port}/health");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| LivedeskError::Internal(format!("failed to create HTTP client: {e}")))?;

    let result = client.get(&url).send().await;

    // A degraded relay answers 503 with the same body.
    match result {
        Ok(resp) if resp.status().is_success() || resp.status().as_u16() == 503 => {
            let health: HealthResponse = resp.json().await.map_err(|e| {
                LivedeskError::Internal(format!("failed to parse health response: {e}"))
            })?;

            let uptime_human = format_uptime(health.uptime_secs);

            if json {
                let status_resp = StatusResponse {
                    running: true,
                    status: health.status.clone(),
                    uptime_secs: Some(health.uptime_secs),
                    uptime_human: Some(uptime_human),
                    version: health.version.clone(),
                    host: host.clone(),
                    port,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status_resp)
                        .unwrap_or_else(|_| "{}".to_string())
                );
            } else {
                let use_color = !plain && std::io::stdout().is_terminal();
                print_status_running(
                    &health.status,
                    &uptime_human,
                    health.version.as_deref(),
                    use_color,
                );
            }
        }
        _ => {
            if json {
                let status_resp = StatusResponse {
                    running: false,
                    status: "not running".to_string(),
                    uptime_secs: None,
                    uptime_human: None,
                    version: None,
                    host: host.clone(),
                    port,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status_resp)
                        .unwrap_or_else(|_| "{}".to_string())
                );
            } else {
                let use_color = !plain && std::io::stdout().is_terminal();
                print_status_offline(host, port, use_color);
            }
        }
    }

    Ok(())
}

/// Print running status with optional colors.
fn print_status_running(status: &str, uptime: &str, version: Option<&str>, use_color: bool) {
    let healthy = status == "ok";
    println!();
    println!("  livedesk status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        if healthy {
            println!(
                "    State:    {} {} (uptime: {})",
                "✓".green(),
                status.green(),
                uptime
            );
        } else {
            println!(
                "    State:    {} {} (uptime: {})",
                "!".yellow(),
                status.yellow(),
                uptime
            );
        }
    } else if healthy {
        println!("    State:    [OK] {status} (uptime: {uptime})");
    } else {
        println!("    State:    [WARN] {status} (uptime: {uptime})");
    }
    if let Some(version) = version {
        println!("    Version:  {version}");
    }

    println!();
}

/// Print offline status with optional colors.
fn print_status_offline(host: &str, port: u16, use_color: bool) {
    println!();
    println!("  livedesk status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        println!("    State:    {} {}", "✗".red(), "not running".red());
    } else {
        println!("    State:    [FAIL] not running");
    }

    println!("    Endpoint: http://{host}:{port}/health");
    println!();
    println!("  Start with: livedesk serve");
    println!();
}
