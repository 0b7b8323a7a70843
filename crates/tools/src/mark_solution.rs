//! Mark solution tool — how a patch mission declares it is done.

use async_trait::async_trait;
use cloudwarden_core::error::ToolError;
use cloudwarden_core::event::EventSink;
use cloudwarden_core::store::{FindingUpdate, PersistQueueStore, WorkKind, WorkStatus, finalize_work_unit};
use cloudwarden_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Records the remediation on the mission's finding and completes the patch.
///
/// Both ids are fixed when the mission starts; the model supplies only the
/// solution text and whether the finding is now fixed.
pub struct MarkSolutionTool {
    store: Arc<dyn PersistQueueStore>,
    events: Arc<dyn EventSink>,
    patch_id: String,
    finding_id: String,
}

impl MarkSolutionTool {
    pub fn new(
        store: Arc<dyn PersistQueueStore>,
        events: Arc<dyn EventSink>,
        patch_id: impl Into<String>,
        finding_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            events,
            patch_id: patch_id.into(),
            finding_id: finding_id.into(),
        }
    }
}

#[derive(Deserialize)]
struct Arguments {
    solution: String,
    fixed: bool,
}

fn failed(reason: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "mark_solution".into(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl Tool for MarkSolutionTool {
    fn name(&self) -> &str {
        "mark_solution"
    }

    fn description(&self) -> &str {
        "Record how the finding was remediated and whether it is now fixed. \
         Call this exactly once, when you are done."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "solution": {
                    "type": "string",
                    "description": "What was changed to remediate the finding, or why it could not be fixed"
                },
                "fixed": {
                    "type": "boolean",
                    "description": "Whether the finding is now resolved"
                }
            },
            "required": ["solution", "fixed"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: Arguments = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(format!("mark_solution: {e}")))?;

        let found = self
            .store
            .update_finding(
                &self.finding_id,
                FindingUpdate {
                    fixed: Some(args.fixed),
                    consent: None,
                    solution: Some(args.solution),
                },
            )
            .await
            .map_err(failed)?;
        if !found {
            return Err(failed(format!("finding {} no longer exists", self.finding_id)));
        }

        finalize_work_unit(
            self.store.as_ref(),
            self.events.as_ref(),
            &self.patch_id,
            WorkKind::Patch,
            WorkStatus::Completed,
        )
        .await
        .map_err(failed)?;

        info!(patch_id = %self.patch_id, finding_id = %self.finding_id, fixed = args.fixed, "Solution recorded");
        Ok(ToolResult::ok("Solution recorded.").completing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudwarden_core::event::EventBus;
    use cloudwarden_core::store::NewFinding;
    use cloudwarden_store::InMemoryStore;

    async fn setup() -> (MarkSolutionTool, Arc<InMemoryStore>, String, String) {
        let store = Arc::new(InMemoryStore::new());
        let finding = store
            .append_finding(
                "scan-1",
                NewFinding {
                    resource: "ec2".into(),
                    resource_name: "sg-web".into(),
                    resource_arn: "arn:aws:ec2:us-east-1:123456789012:security-group/sg-web".into(),
                    severity: "critical".into(),
                    message: "SSH open to the world".into(),
                    issue: "0.0.0.0/0 on port 22".into(),
                    details: "Ingress rule allows 22/tcp from anywhere".into(),
                },
            )
            .await
            .unwrap();
        let patch = store
            .create_work_unit(WorkKind::Patch, json!({"finding_id": finding.id}))
            .await
            .unwrap();
        let tool = MarkSolutionTool::new(store.clone(), Arc::new(EventBus::new(16)), patch.id.clone(), finding.id.clone());
        (tool, store, patch.id, finding.id)
    }

    #[tokio::test]
    async fn records_solution_and_completes_patch() {
        let (tool, store, patch_id, finding_id) = setup().await;
        let result = tool
            .execute(json!({"solution": "Revoked 0.0.0.0/0 on 22", "fixed": true}))
            .await
            .unwrap();
        assert!(result.completes_mission);

        let finding = store.get_finding(&finding_id).await.unwrap().unwrap();
        assert!(finding.fixed);
        assert_eq!(finding.solution.as_deref(), Some("Revoked 0.0.0.0/0 on 22"));

        let patch = store.get_work_unit(&patch_id).await.unwrap().unwrap();
        assert_eq!(patch.status, WorkStatus::Completed);
    }

    #[tokio::test]
    async fn wrong_argument_type_is_invalid() {
        let (tool, store, patch_id, _) = setup().await;
        let err = tool
            .execute(json!({"solution": "done", "fixed": "yes"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert_eq!(
            store.get_work_unit(&patch_id).await.unwrap().unwrap().status,
            WorkStatus::Pending
        );
    }

    #[tokio::test]
    async fn already_failed_patch_is_not_revived() {
        let (tool, store, patch_id, _) = setup().await;
        store.set_work_unit_status(&patch_id, WorkStatus::Failed).await.unwrap();

        tool.execute(json!({"solution": "late", "fixed": false})).await.unwrap();
        assert_eq!(
            store.get_work_unit(&patch_id).await.unwrap().unwrap().status,
            WorkStatus::Failed
        );
    }
}
