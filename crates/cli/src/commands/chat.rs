//! `cloudwarden chat` — single-message or interactive chat.

use super::{CmdResult, Runtime, wait_for};
use cloudwarden_agent::SessionManager;
use cloudwarden_core::event::EventBus;
use cloudwarden_core::store::{PersistQueueStore, WorkStatus};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(message: Option<String>) -> CmdResult {
    let runtime = Runtime::open().await?;
    let bus = runtime.event_bus();
    let sessions = runtime.sessions(bus.clone()).await?;

    if let Some(msg) = message {
        return reply(&sessions, &bus, &msg).await;
    }

    let settings = runtime.store.get_settings().await?;
    println!();
    println!("  CloudWarden — Interactive Chat");
    println!();
    println!("  Model:    {}", settings.model);
    println!("  Monitor:  {}", if settings.monitor_mode { "on (commands need approval)" } else { "off" });
    println!();
    println!("  Type your message and press Enter. Type 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        if let Err(e) = reply(&sessions, &bus, line).await {
            eprintln!("  [Error] {e}");
        }
    }

    println!();
    Ok(())
}

async fn reply(sessions: &SessionManager, bus: &Arc<EventBus>, message: &str) -> CmdResult {
    let monitor_mode = sessions.store().get_settings().await?.monitor_mode;
    let events = bus.subscribe();
    let submission = sessions.submit_chat(message).await?;
    let id = submission.id.clone();
    wait_for(submission, events, monitor_mode).await?;

    let record = sessions
        .store()
        .get_chat_message(&id)
        .await?
        .ok_or_else(|| format!("Chat message {id} disappeared"))?;
    let response = record.ai_response.unwrap_or_default();

    println!();
    for line in response.lines() {
        println!("  Assistant > {line}");
    }
    println!();

    if record.status == WorkStatus::Failed {
        return Err("The reply did not complete".into());
    }
    Ok(())
}

pub async fn history(clear: bool) -> CmdResult {
    let runtime = Runtime::open().await?;

    if clear {
        let removed = runtime.store.clear_chat_history().await?;
        if removed == 0 {
            return Err("No messages to clear".into());
        }
        println!("✅ Chat cleared ({removed} messages)");
        return Ok(());
    }

    let history = runtime.store.get_chat_history().await?;
    if history.is_empty() {
        println!("  No chat history");
    }
    for record in history {
        println!("[{}] {} ({})", record.created_at.format("%Y-%m-%d %H:%M:%S"), record.id, record.status);
        println!("  You > {}", record.user_message);
        if let Some(reply) = record.ai_response {
            for line in reply.lines() {
                println!("  Assistant > {line}");
            }
        }
        println!();
    }
    Ok(())
}
