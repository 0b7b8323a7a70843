//! Store findings tool — the classification pass's only output channel.
//!
//! Persists the classified findings against the scan they belong to as one
//! all-or-nothing batch, then completes the scan. The scan id is bound when the tool is built, so the
//! model cannot file findings under another scan.

use async_trait::async_trait;
use cloudwarden_core::error::ToolError;
use cloudwarden_core::event::EventSink;
use cloudwarden_core::store::{NewFinding, PersistQueueStore, WorkKind, WorkStatus, finalize_work_unit};
use cloudwarden_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct StoreFindingsTool {
    store: Arc<dyn PersistQueueStore>,
    events: Arc<dyn EventSink>,
    scan_id: String,
}

impl StoreFindingsTool {
    pub fn new(store: Arc<dyn PersistQueueStore>, events: Arc<dyn EventSink>, scan_id: impl Into<String>) -> Self {
        Self {
            store,
            events,
            scan_id: scan_id.into(),
        }
    }
}

#[derive(Deserialize)]
struct Arguments {
    findings: Vec<NewFinding>,
}

fn failed(reason: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "store_findings".into(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl Tool for StoreFindingsTool {
    fn name(&self) -> &str {
        "store_findings"
    }

    fn description(&self) -> &str {
        "Store the security findings extracted from the scan report. \
         Call this once with every finding; pass an empty list if there are none."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        let text = |description: &str| json!({ "type": "string", "description": description });
        json!({
            "type": "object",
            "properties": {
                "findings": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "resource": text("AWS service of the affected resource, e.g. 's3'"),
                            "resource_name": text("Name of the affected resource"),
                            "resource_arn": text("ARN of the affected resource"),
                            "severity": {
                                "type": "string",
                                "enum": ["low", "medium", "high", "critical"],
                                "description": "How severe the issue is"
                            },
                            "message": text("One-line summary of the finding"),
                            "issue": text("The misconfiguration or vulnerability"),
                            "details": text("Evidence and context for the finding")
                        },
                        "required": ["resource", "resource_name", "resource_arn", "severity", "message", "issue", "details"]
                    }
                }
            },
            "required": ["findings"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: Arguments = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(format!("findings: {e}")))?;

        let findings: Vec<NewFinding> = args
            .findings
            .into_iter()
            .map(|mut finding| {
                finding.severity = finding.severity.trim().to_lowercase();
                finding
            })
            .collect();
        let count = findings.len();

        self.store
            .append_findings(&self.scan_id, findings)
            .await
            .map_err(failed)?;

        finalize_work_unit(
            self.store.as_ref(),
            self.events.as_ref(),
            &self.scan_id,
            WorkKind::Scan,
            WorkStatus::Completed,
        )
        .await
        .map_err(failed)?;

        info!(scan_id = %self.scan_id, count, "Stored scan findings");
        Ok(ToolResult::ok(format!("Stored {count} finding(s).")).completing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudwarden_core::event::EventBus;
    use cloudwarden_store::InMemoryStore;

    async fn setup() -> (StoreFindingsTool, Arc<InMemoryStore>, String, Arc<EventBus>) {
        let store = Arc::new(InMemoryStore::new());
        let scan = store
            .create_work_unit(WorkKind::Scan, json!({"services": ["s3"], "regions": ["us-east-1"]}))
            .await
            .unwrap();
        store.set_work_unit_status(&scan.id, WorkStatus::Running).await.unwrap();
        let bus = Arc::new(EventBus::new(16));
        let tool = StoreFindingsTool::new(store.clone(), bus.clone(), scan.id.clone());
        (tool, store, scan.id, bus)
    }

    fn finding(severity: &str) -> serde_json::Value {
        json!({
            "resource": "s3",
            "resource_name": "public-assets",
            "resource_arn": "arn:aws:s3:::public-assets",
            "severity": severity,
            "message": "Bucket is publicly readable",
            "issue": "Public access block disabled",
            "details": "BlockPublicAcls=false"
        })
    }

    #[tokio::test]
    async fn stores_findings_and_completes_scan() {
        let (tool, store, scan_id, bus) = setup().await;
        let mut rx = bus.subscribe();

        let result = tool
            .execute(json!({"findings": [finding("HIGH"), finding(" Medium ")]}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.completes_mission);

        let findings = store.list_findings().await.unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, "high");
        assert_eq!(findings[1].severity, "medium");
        assert!(findings.iter().all(|f| f.scan_id == scan_id));

        let unit = store.get_work_unit(&scan_id).await.unwrap().unwrap();
        assert_eq!(unit.status, WorkStatus::Completed);
        assert_eq!(rx.recv().await.unwrap().name(), "work:status");
    }

    #[tokio::test]
    async fn empty_list_still_completes() {
        let (tool, store, scan_id, _) = setup().await;
        let result = tool.execute(json!({"findings": []})).await.unwrap();
        assert!(result.completes_mission);
        assert!(store.list_findings().await.unwrap().is_empty());
        assert_eq!(
            store.get_work_unit(&scan_id).await.unwrap().unwrap().status,
            WorkStatus::Completed
        );
    }

    #[tokio::test]
    async fn malformed_finding_is_invalid_and_leaves_scan_running() {
        let (tool, store, scan_id, _) = setup().await;
        let err = tool
            .execute(json!({"findings": [{"resource": "s3"}]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert_eq!(
            store.get_work_unit(&scan_id).await.unwrap().unwrap().status,
            WorkStatus::Running
        );
    }

    #[tokio::test]
    async fn one_bad_finding_stores_none_of_the_batch() {
        let (tool, store, scan_id, _) = setup().await;
        let err = tool
            .execute(json!({"findings": [finding("high"), finding("low"), {"resource": "iam"}]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(store.list_findings().await.unwrap().is_empty());
        assert_eq!(
            store.get_work_unit(&scan_id).await.unwrap().unwrap().status,
            WorkStatus::Running
        );
    }
}
