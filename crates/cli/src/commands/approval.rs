//! `cloudwarden pending|approve|reject` — the approver's side of the gate.
//!
//! These run against the same database as the waiting mission, which picks
//! up the decision on its next poll.

use super::{CmdResult, Runtime};
use cloudwarden_core::event::EventBus;
use cloudwarden_core::store::{CommandDecision, PersistQueueStore};
use cloudwarden_security::CommandGate;
use std::sync::Arc;

pub async fn pending() -> CmdResult {
    let runtime = Runtime::open().await?;
    let commands = runtime.store.list_pending_commands().await?;
    if commands.is_empty() {
        println!("  No commands awaiting approval");
    }
    for cmd in commands {
        println!("{}  {}  {}", cmd.id, cmd.created_at.format("%H:%M:%S"), cmd.command);
    }
    Ok(())
}

pub async fn decide(id: &str, decision: CommandDecision) -> CmdResult {
    let runtime = Runtime::open().await?;
    let gate = CommandGate::new(runtime.store.clone(), Arc::new(EventBus::new(1)));
    let status = gate.decide(id, decision).await?;
    println!("✅ Command {id} {status}");
    Ok(())
}
