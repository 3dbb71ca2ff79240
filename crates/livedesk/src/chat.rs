// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `livedesk chat`: a terminal visitor widget.
//!
//! Reads lines with rustyline on a blocking thread and hands them to the
//! poller, while a background poll loop prints agent replies as they land.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use livedesk_config::model::LivedeskConfig;
use livedesk_core::{LivedeskError, MessageId, SenderRole};
use livedesk_widget::{
    CacheStore, CachedMessage, DeliveryState, HttpTransport, PageContext, Poller, poll_loop,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Activity ping cadence while the session is open.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// One line of terminal input, already classified.
#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput {
    Quit,
    Retry,
    Message(String),
    Empty,
}

pub fn parse_input(line: &str) -> ChatInput {
    match line.trim() {
        "" => ChatInput::Empty,
        "/quit" | "/exit" => ChatInput::Quit,
        "/retry" => ChatInput::Retry,
        text => ChatInput::Message(text.to_string()),
    }
}

/// Renders one transcript line.
pub fn format_message(message: &CachedMessage) -> String {
    let who = match message.sender_role {
        SenderRole::Visitor => "you",
        SenderRole::Agent => "agent",
    };
    let suffix = match message.state {
        DeliveryState::Pending => " (sending)",
        DeliveryState::Failed => " (failed, /retry to resend)",
        DeliveryState::Sent => "",
    };
    format!("{who}: {}{suffix}", message.body)
}

fn print_message(message: &CachedMessage) {
    let line = format_message(message);
    match (message.sender_role, message.state) {
        (_, DeliveryState::Failed) => println!("{}", line.red()),
        (SenderRole::Agent, _) => println!("{}", line.green()),
        (SenderRole::Visitor, _) => println!("{line}"),
    }
}

pub async fn run_chat(
    config: &LivedeskConfig,
    widget_key: &str,
    server: Option<&str>,
) -> Result<(), LivedeskError> {
    let server_url = server.unwrap_or(&config.server.public_url);
    let transport = HttpTransport::new(
        server_url,
        widget_key,
        Duration::from_secs(config.widget.request_timeout_secs),
    )?;
    let page = PageContext {
        url: Some(format!("{}/terminal", server_url.trim_end_matches('/'))),
        user_agent: Some(concat!("livedesk-cli/", env!("CARGO_PKG_VERSION")).to_string()),
        referrer: None,
    };
    let store = CacheStore::new(&config.widget.cache_dir, widget_key);
    let mut poller = Poller::with_store(Arc::new(transport), &config.widget, page, store).await;

    let widget = poller.load_config().await?;
    poller.register().await?;
    println!("{}", widget.greeting_message.bold());
    if !poller.agent_online() {
        println!("{}", widget.offline_message.yellow());
    }
    poller.tick().await;
    for message in poller.messages() {
        print_message(message);
    }
    poller.open_panel().await;

    let poller = Arc::new(Mutex::new(poller));
    let cancel = CancellationToken::new();
    let (updates_tx, mut updates_rx) = mpsc::channel::<Vec<CachedMessage>>(16);
    let (lines_tx, mut lines_rx) = mpsc::channel::<String>(16);

    let poll_task = tokio::spawn(poll_loop(poller.clone(), cancel.clone(), updates_tx));
    let reader = spawn_reader(lines_tx);
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            Some(added) = updates_rx.recv() => {
                for message in added.iter().filter(|m| m.sender_role == SenderRole::Agent) {
                    print_message(message);
                }
                poller.lock().await.open_panel().await;
            }
            line = lines_rx.recv() => {
                let Some(line) = line else { break };
                match parse_input(&line) {
                    ChatInput::Quit => break,
                    ChatInput::Empty => {}
                    ChatInput::Retry => retry_failed(&poller).await,
                    ChatInput::Message(text) => send(&poller, &text).await,
                }
            }
            _ = heartbeat.tick() => {
                poller.lock().await.heartbeat("ping").await;
            }
        }
    }

    cancel.cancel();
    let _ = poll_task.await;
    let _ = reader.await;
    debug!("chat session closed");
    Ok(())
}

async fn send(poller: &Mutex<Poller>, text: &str) {
    let mut poller = poller.lock().await;
    let seen: HashSet<MessageId> = poller.messages().iter().filter_map(|m| m.id).collect();
    let local_id = match poller.send(text).await {
        Ok(local_id) => local_id,
        Err(e) => {
            println!("{}", e.to_string().red());
            return;
        }
    };
    // Offline auto-replies arrive with the send response.
    for message in poller.messages() {
        let failed_here = message.local_id == Some(local_id) && message.state == DeliveryState::Failed;
        let new_reply = message.sender_role == SenderRole::Agent
            && message.id.is_some_and(|id| !seen.contains(&id));
        if failed_here || new_reply {
            print_message(message);
        }
    }
    if let Some(notice) = poller.notice() {
        println!("{}", notice.yellow());
    }
}

async fn retry_failed(poller: &Mutex<Poller>) {
    let mut poller = poller.lock().await;
    let failed: Vec<_> = poller
        .messages()
        .iter()
        .filter(|m| m.state == DeliveryState::Failed)
        .filter_map(|m| m.local_id)
        .collect();
    if failed.is_empty() {
        println!("nothing to retry");
        return;
    }
    for local_id in failed {
        match poller.retry(local_id).await {
            Ok(DeliveryState::Sent) => println!("{}", "delivered".green()),
            Ok(_) => println!("{}", "still failing".red()),
            Err(e) => println!("{}", e.to_string().red()),
        }
    }
}

/// Reads lines on a blocking thread until `/quit`, EOF, or Ctrl+C.
fn spawn_reader(lines: mpsc::Sender<String>) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("error: failed to initialize line editor: {e}");
                return;
            }
        };
        loop {
            match rl.readline("> ") {
                Ok(line) => {
                    let _ = rl.add_history_entry(line.as_str());
                    let quit = parse_input(&line) == ChatInput::Quit;
                    if lines.blocking_send(line).is_err() || quit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("error: {e}");
                    break;
                }
            }
        }
    })
}
