//! `cloudwarden status` — look up a scan, patch, or chat mission.

use super::{CmdResult, Runtime};
use cloudwarden_core::store::PersistQueueStore;

pub async fn run(id: &str) -> CmdResult {
    let runtime = Runtime::open().await?;

    if let Some(unit) = runtime.store.get_work_unit(id).await? {
        println!("{} {}: {}", unit.kind, unit.id, unit.status);
        println!("  created: {}", unit.created_at.format("%Y-%m-%d %H:%M:%S"));
        println!("  updated: {}", unit.updated_at.format("%Y-%m-%d %H:%M:%S"));
        println!("  payload: {}", unit.payload);
        return Ok(());
    }
    if let Some(chat) = runtime.store.get_chat_message(id).await? {
        println!("chat {}: {}", chat.id, chat.status);
        return Ok(());
    }
    Err(format!("No scan, patch, or chat with id {id}").into())
}
