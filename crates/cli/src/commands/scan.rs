//! `cloudwarden scan` — audit services across regions.

use super::{CmdResult, Runtime, wait_for};
use cloudwarden_core::store::{PersistQueueStore, WorkStatus};

pub async fn run(services: Vec<String>, regions: Vec<String>) -> CmdResult {
    let runtime = Runtime::open().await?;

    let catalog = &runtime.config.catalog;
    for service in services.iter().filter(|s| !catalog.services.contains(s)) {
        eprintln!("  ⚠️  Service {service} is not in the configured catalogue");
    }
    for region in regions.iter().filter(|r| !catalog.regions.contains(r)) {
        eprintln!("  ⚠️  Region {region} is not in the configured catalogue");
    }

    let bus = runtime.event_bus();
    let sessions = runtime.sessions(bus.clone()).await?;
    let monitor_mode = runtime.store.get_settings().await?.monitor_mode;

    let events = bus.subscribe();
    let submission = sessions.submit_scan(&services, &regions).await?;
    let scan_id = submission.id.clone();
    println!("Scan started: {scan_id}");
    wait_for(submission, events, monitor_mode).await?;

    let status = sessions.get_status(&scan_id).await?;
    let found = runtime
        .store
        .list_findings()
        .await?
        .into_iter()
        .filter(|f| f.scan_id == scan_id)
        .count();
    println!("Scan {scan_id}: {status}, {found} finding(s)");

    if status == WorkStatus::Failed {
        return Err("Scan failed".into());
    }
    Ok(())
}
