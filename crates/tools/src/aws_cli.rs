//! AWS CLI tool — the agent's only way to touch the connected account.
//!
//! Every command goes through the [`CommandExecutor`], so it is announced,
//! gated on approval when monitor mode is on, and run with the mission's
//! credential snapshot. The model always gets a JSON object back:
//! `{"output": <stdout or null>, "error": <message or null>}`.

use async_trait::async_trait;
use cloudwarden_core::error::{ExecutionError, ToolError};
use cloudwarden_core::store::Credentials;
use cloudwarden_core::tool::{Tool, ToolResult};
use cloudwarden_security::{CommandExecutor, CommandOutcome, ExecutionPolicy};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

pub const REJECTED_MESSAGE: &str = "Command execution rejected.";
pub const TIMEOUT_MESSAGE: &str = "Command execution timeout.";

pub struct AwsCliTool {
    executor: Arc<CommandExecutor>,
    credentials: Option<Credentials>,
    policy: ExecutionPolicy,
}

impl AwsCliTool {
    pub fn new(executor: Arc<CommandExecutor>, credentials: Option<Credentials>, policy: ExecutionPolicy) -> Self {
        Self {
            executor,
            credentials,
            policy,
        }
    }
}

/// Prefix `aws ` unless the command already invokes the CLI.
pub fn normalize_command(command: &str) -> String {
    let trimmed = command.trim();
    if trimmed.split_whitespace().next() == Some("aws") {
        trimmed.to_string()
    } else {
        format!("aws {trimmed}")
    }
}

fn payload(output: Option<&str>, error: Option<&str>) -> String {
    json!({ "output": output, "error": error }).to_string()
}

/// Render an executor outcome as the tool's JSON result.
pub fn outcome_result(outcome: &CommandOutcome) -> ToolResult {
    match outcome {
        CommandOutcome::Executed(out) if out.success() => ToolResult::ok(payload(Some(&out.stdout), None)),
        CommandOutcome::Executed(out) => {
            let error = if out.stderr.trim().is_empty() {
                format!("Command exited with status {}", out.exit_code)
            } else {
                out.stderr.clone()
            };
            ToolResult::failed(payload(None, Some(&error)))
        }
        CommandOutcome::Rejected => ToolResult::failed(payload(None, Some(REJECTED_MESSAGE))),
        CommandOutcome::TimedOut => ToolResult::failed(payload(None, Some(TIMEOUT_MESSAGE))),
    }
}

#[async_trait]
impl Tool for AwsCliTool {
    fn name(&self) -> &str {
        "aws_cli"
    }

    fn description(&self) -> &str {
        "Execute an AWS CLI command against the connected account and return its output. \
         Commands may require human approval before they run."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The AWS CLI command to run, e.g. 'aws s3api list-buckets'"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let raw = arguments["command"]
            .as_str()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("'command' must be a non-empty string".into()))?;
        let command = normalize_command(raw);

        let Some(credentials) = &self.credentials else {
            let err = ExecutionError::Credentials("no AWS account connected".into());
            warn!(command = %command, "Refusing to run command without credentials");
            return Ok(ToolResult::failed(payload(None, Some(&err.to_string()))));
        };

        debug!(command = %command, "Proposing AWS CLI command");
        match self.executor.execute(&command, credentials, self.policy).await {
            Ok(outcome) => Ok(outcome_result(&outcome)),
            Err(e) => {
                warn!(command = %command, error = %e, "Command could not be executed");
                Ok(ToolResult::failed(payload(None, Some(&e.to_string()))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudwarden_core::event::EventBus;
    use cloudwarden_core::store::PersistQueueStore;
    use cloudwarden_security::{CommandGate, CommandOutput, ShellRunner};
    use cloudwarden_store::InMemoryStore;
    use std::sync::Mutex;
    use std::time::Duration;

    struct EchoRunner {
        commands: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ShellRunner for EchoRunner {
        async fn spawn(&self, command: &str, _env: &[(String, String)]) -> Result<CommandOutput, ExecutionError> {
            self.commands.lock().unwrap().push(command.to_string());
            Ok(CommandOutput {
                stdout: format!("ran: {command}"),
                stderr: String::new(),
                exit_code: 0,
            })
        }
    }

    fn tool(store: Arc<InMemoryStore>, monitor_enabled: bool, credentials: Option<Credentials>) -> (AwsCliTool, Arc<EchoRunner>) {
        let runner = Arc::new(EchoRunner {
            commands: Mutex::new(Vec::new()),
        });
        let gate = CommandGate::new(store, Arc::new(EventBus::new(16)));
        let executor = Arc::new(CommandExecutor::new(Arc::new(gate), runner.clone()));
        let policy = ExecutionPolicy {
            monitor_enabled,
            max_wait: Duration::from_secs(260),
        };
        (AwsCliTool::new(executor, credentials, policy), runner)
    }

    fn creds() -> Option<Credentials> {
        Some(Credentials {
            aws_access_key: "AKIA".into(),
            aws_secret_key: "secret".into(),
            aws_region: "us-east-1".into(),
            aws_session_token: None,
            model_api_key: None,
        })
    }

    fn parse(result: &ToolResult) -> serde_json::Value {
        serde_json::from_str(&result.output).unwrap()
    }

    #[test]
    fn prefixes_aws_when_missing() {
        assert_eq!(normalize_command("s3 ls"), "aws s3 ls");
        assert_eq!(normalize_command("  aws s3 ls "), "aws s3 ls");
        assert_eq!(normalize_command("awsome-tool --x"), "aws awsome-tool --x");
    }

    #[tokio::test(start_paused = true)]
    async fn runs_normalized_command_and_reports_output() {
        let (tool, runner) = tool(Arc::new(InMemoryStore::new()), false, creds());
        let result = tool
            .execute(json!({"command": "s3api list-buckets"}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(!result.completes_mission);
        let body = parse(&result);
        assert_eq!(body["output"], "ran: aws s3api list-buckets");
        assert!(body["error"].is_null());
        assert_eq!(runner.commands.lock().unwrap().as_slice(), ["aws s3api list-buckets"]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_error_result() {
        let (tool, runner) = tool(Arc::new(InMemoryStore::new()), true, creds());
        let result = tool.execute(json!({"command": "aws s3 ls"})).await.unwrap();

        assert!(!result.success);
        let body = parse(&result);
        assert!(body["output"].is_null());
        assert_eq!(body["error"], TIMEOUT_MESSAGE);
        assert!(runner.commands.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_becomes_error_result() {
        let store = Arc::new(InMemoryStore::new());
        let (tool, _) = tool(store.clone(), true, creds());

        let approver = store.clone();
        tokio::spawn(async move {
            loop {
                if let Some(cmd) = approver.list_pending_commands().await.unwrap().first() {
                    approver
                        .set_pending_command_status(&cmd.id, cloudwarden_core::CommandStatus::Rejected)
                        .await
                        .unwrap();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        });

        let result = tool.execute(json!({"command": "aws s3 rb s3://logs"})).await.unwrap();
        assert_eq!(parse(&result)["error"], REJECTED_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credentials_is_recoverable() {
        let (tool, runner) = tool(Arc::new(InMemoryStore::new()), false, None);
        let result = tool.execute(json!({"command": "aws s3 ls"})).await.unwrap();
        assert!(!result.success);
        assert!(parse(&result)["error"].as_str().unwrap().contains("Credentials unavailable"));
        assert!(runner.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_command_is_invalid() {
        let (tool, _) = tool(Arc::new(InMemoryStore::new()), false, creds());
        let err = tool.execute(json!({"command": "   "})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn failed_exit_reports_stderr_or_status() {
        let with_stderr = outcome_result(&CommandOutcome::Executed(CommandOutput {
            stdout: "partial".into(),
            stderr: "AccessDenied".into(),
            exit_code: 254,
        }));
        assert!(!with_stderr.success);
        assert_eq!(parse(&with_stderr)["error"], "AccessDenied");
        assert!(parse(&with_stderr)["output"].is_null());

        let silent = outcome_result(&CommandOutcome::Executed(CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 2,
        }));
        assert_eq!(parse(&silent)["error"], "Command exited with status 2");
    }
}
