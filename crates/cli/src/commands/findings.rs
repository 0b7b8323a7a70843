//! `cloudwarden findings` and `cloudwarden consent`.

use super::{CmdResult, Runtime};
use cloudwarden_core::store::{FindingUpdate, PersistQueueStore};

pub async fn list(json: bool) -> CmdResult {
    let runtime = Runtime::open().await?;
    let findings = runtime.store.list_findings().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&findings)?);
        return Ok(());
    }

    if findings.is_empty() {
        println!("  No findings");
        return Ok(());
    }
    for f in &findings {
        let state = match (f.fixed, f.consent) {
            (true, _) => "fixed",
            (false, true) => "consented",
            (false, false) => "open",
        };
        println!("{} [{}] {} {} — {}", f.id, f.severity, f.resource, f.resource_name, f.message);
        println!("    {}  ({state})", f.resource_arn);
        if let Some(solution) = &f.solution {
            println!("    solution: {solution}");
        }
    }
    Ok(())
}

pub async fn consent(id: &str, revoke: bool) -> CmdResult {
    let runtime = Runtime::open().await?;
    let updated = runtime
        .store
        .update_finding(
            id,
            FindingUpdate {
                consent: Some(!revoke),
                ..Default::default()
            },
        )
        .await?;
    if !updated {
        return Err(format!("Finding not found: {id}").into());
    }
    println!("✅ Consent {} for {id}", if revoke { "revoked" } else { "granted" });
    Ok(())
}
