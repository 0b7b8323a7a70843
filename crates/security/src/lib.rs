//! Command safety for CloudWarden — approval gating, execution, redaction.
//!
//! Provides:
//! - **Gate**: queue a proposed command and wait for a human decision
//! - **Executor**: run approved commands with credentials in the environment
//! - **Redaction**: mask injected secrets in command output

pub mod executor;
pub mod gate;
pub mod redact;

pub use executor::{
    CommandExecutor, CommandOutcome, CommandOutput, ExecutionPolicy, ShellRunner, TokioShellRunner,
    credential_env,
};
pub use gate::{CommandGate, Decision};
pub use redact::{REDACTED, Redactor};
