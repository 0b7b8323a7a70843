//! Tool implementations for CloudWarden missions.
//!
//! - `aws_cli` — run a gated AWS CLI command (chat and scan missions)
//! - `store_findings` — persist classified findings (scan classification)
//! - `mark_solution` — record a remediation (patch missions)
//!
//! Each mission builds its own registry from these, binding the ids it owns.

pub mod aws_cli;
pub mod mark_solution;
pub mod store_findings;

pub use aws_cli::AwsCliTool;
pub use mark_solution::MarkSolutionTool;
pub use store_findings::StoreFindingsTool;
