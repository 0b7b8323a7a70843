//! Command Executor — runs an approved command with account credentials.
//!
//! Every call goes through the [`CommandGate`] first. Only `Approved` reaches
//! the [`ShellRunner`]; a rejection or timeout returns without spawning.
//! Credentials travel in the child's environment, never in the command text.

use async_trait::async_trait;
use cloudwarden_core::error::ExecutionError;
use cloudwarden_core::store::Credentials;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::gate::{CommandGate, Decision};
use crate::redact::Redactor;

/// Raw result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The ShellRunner seam: spawn a command line with extra environment.
#[async_trait]
pub trait ShellRunner: Send + Sync {
    async fn spawn(&self, command: &str, env: &[(String, String)]) -> Result<CommandOutput, ExecutionError>;
}

/// Runs commands through the platform shell (`sh -c`, or `cmd /C` on Windows).
#[derive(Debug, Clone, Default)]
pub struct TokioShellRunner;

#[async_trait]
impl ShellRunner for TokioShellRunner {
    async fn spawn(&self, command: &str, env: &[(String, String)]) -> Result<CommandOutput, ExecutionError> {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };

        let output = cmd
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExecutionError::Spawn(e.to_string()))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Environment variables the AWS CLI reads credentials from.
pub fn credential_env(credentials: &Credentials) -> Vec<(String, String)> {
    let mut env = vec![
        ("AWS_ACCESS_KEY_ID".to_string(), credentials.aws_access_key.clone()),
        ("AWS_SECRET_ACCESS_KEY".to_string(), credentials.aws_secret_key.clone()),
        ("AWS_DEFAULT_REGION".to_string(), credentials.aws_region.clone()),
    ];
    if let Some(token) = &credentials.aws_session_token {
        env.push(("AWS_SESSION_TOKEN".to_string(), token.clone()));
    }
    env
}

/// Per-mission gate settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPolicy {
    pub monitor_enabled: bool,
    pub max_wait: Duration,
}

/// What happened to a proposed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Approved and run; the output is already redacted
    Executed(CommandOutput),
    Rejected,
    TimedOut,
}

pub struct CommandExecutor {
    gate: Arc<CommandGate>,
    runner: Arc<dyn ShellRunner>,
    run_timeout: Duration,
}

impl CommandExecutor {
    pub fn new(gate: Arc<CommandGate>, runner: Arc<dyn ShellRunner>) -> Self {
        Self {
            gate,
            runner,
            run_timeout: Duration::from_secs(300),
        }
    }

    /// Stop an approved command that runs longer than `run_timeout`.
    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    pub fn gate(&self) -> &Arc<CommandGate> {
        &self.gate
    }

    /// Propose, await approval, then run `command` with `credentials`.
    ///
    /// Errors are environment-level only: the queue could not be written, the
    /// process could not be spawned, or it outlived the run timeout. A
    /// non-zero exit is a normal outcome.
    pub async fn execute(
        &self,
        command: &str,
        credentials: &Credentials,
        policy: ExecutionPolicy,
    ) -> Result<CommandOutcome, ExecutionError> {
        let command_id = self.gate.submit(command).await?;

        match self
            .gate
            .await_decision(&command_id, policy.monitor_enabled, policy.max_wait)
            .await
        {
            Decision::Approved => {}
            Decision::Rejected => return Ok(CommandOutcome::Rejected),
            Decision::TimedOut => return Ok(CommandOutcome::TimedOut),
        }

        debug!(command_id = %command_id, "Spawning approved command");
        let env = credential_env(credentials);
        let output = tokio::time::timeout(self.run_timeout, self.runner.spawn(command, &env))
            .await
            .map_err(|_| {
                warn!(command_id = %command_id, timeout_secs = self.run_timeout.as_secs(), "Command exceeded its run timeout");
                ExecutionError::Expired(self.run_timeout.as_secs())
            })??;

        let redactor = Redactor::new(credentials.secret_values());
        if redactor.contains_secret(&output.stdout) || redactor.contains_secret(&output.stderr) {
            warn!(command_id = %command_id, "Command output contained credentials; redacted");
        }
        let output = CommandOutput {
            stdout: redactor.redact(&output.stdout),
            stderr: redactor.redact(&output.stderr),
            exit_code: output.exit_code,
        };

        info!(command_id = %command_id, exit_code = output.exit_code, "Command finished");
        Ok(CommandOutcome::Executed(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudwarden_core::event::EventBus;
    use cloudwarden_core::store::{CommandDecision, PersistQueueStore};
    use cloudwarden_store::InMemoryStore;
    use std::sync::Mutex;

    /// Records spawns and replies with a canned output.
    struct RecordingRunner {
        reply: CommandOutput,
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl RecordingRunner {
        fn replying(stdout: &str, stderr: &str, exit_code: i32) -> Arc<Self> {
            Arc::new(Self {
                reply: CommandOutput {
                    stdout: stdout.into(),
                    stderr: stderr.into(),
                    exit_code,
                },
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ShellRunner for RecordingRunner {
        async fn spawn(&self, command: &str, env: &[(String, String)]) -> Result<CommandOutput, ExecutionError> {
            self.calls.lock().unwrap().push((command.to_string(), env.to_vec()));
            Ok(self.reply.clone())
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            aws_access_key: "AKIAEXAMPLE".into(),
            aws_secret_key: "wJalrXUtnFEMI/K7MDENG".into(),
            aws_region: "eu-west-1".into(),
            aws_session_token: None,
            model_api_key: None,
        }
    }

    fn executor(store: Arc<InMemoryStore>, runner: Arc<RecordingRunner>) -> CommandExecutor {
        let gate = CommandGate::new(store, Arc::new(EventBus::new(16)));
        CommandExecutor::new(Arc::new(gate), runner)
    }

    const UNSUPERVISED: ExecutionPolicy = ExecutionPolicy {
        monitor_enabled: false,
        max_wait: Duration::from_secs(260),
    };

    const SUPERVISED: ExecutionPolicy = ExecutionPolicy {
        monitor_enabled: true,
        max_wait: Duration::from_secs(260),
    };

    #[test]
    fn credential_env_includes_token_only_when_present() {
        let mut creds = credentials();
        let keys: Vec<String> = credential_env(&creds).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "AWS_DEFAULT_REGION"]);

        creds.aws_session_token = Some("session".into());
        let env = credential_env(&creds);
        assert_eq!(env.last().unwrap(), &("AWS_SESSION_TOKEN".to_string(), "session".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn unsupervised_command_runs_with_credentials_in_env() {
        let runner = RecordingRunner::replying("bucket-a\n", "", 0);
        let exec = executor(Arc::new(InMemoryStore::new()), runner.clone());

        let outcome = exec.execute("aws s3 ls", &credentials(), UNSUPERVISED).await.unwrap();
        assert!(matches!(outcome, CommandOutcome::Executed(ref o) if o.stdout == "bucket-a\n"));

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "aws s3 ls");
        assert!(!calls[0].0.contains("wJalrXUtnFEMI"));
        assert!(calls[0]
            .1
            .contains(&("AWS_SECRET_ACCESS_KEY".to_string(), "wJalrXUtnFEMI/K7MDENG".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_command_never_spawns() {
        let store = Arc::new(InMemoryStore::new());
        let runner = RecordingRunner::replying("", "", 0);
        let exec = executor(store.clone(), runner.clone());

        let approver = exec.gate().clone();
        let store_view = store.clone();
        tokio::spawn(async move {
            loop {
                if let Some(cmd) = store_view.list_pending_commands().await.unwrap().first() {
                    approver.decide(&cmd.id, CommandDecision::Reject).await.unwrap();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        });

        let outcome = exec
            .execute("aws s3 rb s3://prod --force", &credentials(), SUPERVISED)
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Rejected);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_command_never_spawns() {
        let runner = RecordingRunner::replying("", "", 0);
        let exec = executor(Arc::new(InMemoryStore::new()), runner.clone());

        let outcome = exec.execute("aws s3 ls", &credentials(), SUPERVISED).await.unwrap();
        assert_eq!(outcome, CommandOutcome::TimedOut);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn nonzero_exit_is_an_outcome_not_an_error() {
        let runner = RecordingRunner::replying("", "An error occurred (AccessDenied)", 254);
        let exec = executor(Arc::new(InMemoryStore::new()), runner);

        let outcome = exec.execute("aws iam list-users", &credentials(), UNSUPERVISED).await.unwrap();
        match outcome {
            CommandOutcome::Executed(output) => {
                assert!(!output.success());
                assert_eq!(output.exit_code, 254);
                assert!(output.stderr.contains("AccessDenied"));
            }
            other => panic!("expected Executed, got {other:?}"),
        }
    }

    /// Never finishes, like `aws logs tail --follow`.
    struct FollowingRunner;

    #[async_trait]
    impl ShellRunner for FollowingRunner {
        async fn spawn(&self, _command: &str, _env: &[(String, String)]) -> Result<CommandOutput, ExecutionError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn long_running_command_is_stopped_at_the_run_timeout() {
        let gate = CommandGate::new(Arc::new(InMemoryStore::new()), Arc::new(EventBus::new(16)));
        let exec = CommandExecutor::new(Arc::new(gate), Arc::new(FollowingRunner))
            .with_run_timeout(Duration::from_secs(30));

        let started = tokio::time::Instant::now();
        let err = exec
            .execute("aws logs tail /aws/lambda/app --follow", &credentials(), UNSUPERVISED)
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::Expired(30)));
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tokio_runner_child_is_killed_at_the_run_timeout() {
        let gate = CommandGate::new(Arc::new(InMemoryStore::new()), Arc::new(EventBus::new(16)));
        let exec = CommandExecutor::new(Arc::new(gate), Arc::new(TokioShellRunner))
            .with_run_timeout(Duration::from_millis(200));

        let started = std::time::Instant::now();
        let err = exec.execute("sleep 30", &credentials(), UNSUPERVISED).await.unwrap_err();

        assert!(matches!(err, ExecutionError::Expired(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn secrets_redacted_from_output() {
        let runner = RecordingRunner::replying(
            "aws_secret_access_key = wJalrXUtnFEMI/K7MDENG\n",
            "",
            0,
        );
        let exec = executor(Arc::new(InMemoryStore::new()), runner);

        let outcome = exec.execute("aws configure list", &credentials(), UNSUPERVISED).await.unwrap();
        let CommandOutcome::Executed(output) = outcome else {
            panic!("expected Executed");
        };
        assert!(!output.stdout.contains("wJalrXUtnFEMI"));
        assert!(output.stdout.contains("[REDACTED]"));
        assert!(output.stdout.contains("aws_secret_access_key"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tokio_runner_passes_env_and_exit_code() {
        let runner = TokioShellRunner;
        let env = vec![("CLOUDWARDEN_TEST_VALUE".to_string(), "from-env".to_string())];

        let ok = runner.spawn("echo $CLOUDWARDEN_TEST_VALUE", &env).await.unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout.trim(), "from-env");

        let failed = runner.spawn("echo oops >&2; exit 3", &[]).await.unwrap();
        assert_eq!(failed.exit_code, 3);
        assert_eq!(failed.stderr.trim(), "oops");
    }
}
