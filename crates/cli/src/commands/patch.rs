//! `cloudwarden patch` — remediate one consented finding.

use super::{CmdResult, Runtime, wait_for};
use cloudwarden_core::store::{PersistQueueStore, WorkStatus};

pub async fn run(finding_id: &str) -> CmdResult {
    let runtime = Runtime::open().await?;
    let bus = runtime.event_bus();
    let sessions = runtime.sessions(bus.clone()).await?;
    let monitor_mode = runtime.store.get_settings().await?.monitor_mode;

    let events = bus.subscribe();
    let submission = sessions.submit_patch(finding_id).await?;
    let patch_id = submission.id.clone();
    println!("Patch started: {patch_id}");
    wait_for(submission, events, monitor_mode).await?;

    let status = sessions.get_status(&patch_id).await?;
    println!("Patch {patch_id}: {status}");
    if let Some(finding) = runtime.store.get_finding(finding_id).await? {
        if let Some(solution) = finding.solution {
            println!("  fixed: {}", finding.fixed);
            println!("  solution: {solution}");
        }
    }

    if status == WorkStatus::Failed {
        return Err("Patch failed".into());
    }
    Ok(())
}
