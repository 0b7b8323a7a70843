//! The agent core of CloudWarden.
//!
//! Each mission is one bounded **ask → act → observe** loop:
//!
//! 1. **Send** the conversation and the mission's tool catalogue to the model
//! 2. **If a tool call**: dispatch it through the registry (AWS CLI commands
//!    pass the approval gate first), append the result, and ask again
//! 3. **If free text**: that is the final answer
//!
//! A loop also stops when a tool reports the mission complete, or when the
//! turn budget runs out. [`SessionManager`] wraps the loop for chat replies,
//! scans (with a second classification pass), and patches, and tracks each
//! as a work unit with a terminal status.

pub mod loop_runner;
pub mod prompts;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use loop_runner::{AgentLoop, LoopOutcome};
pub use session::{MissionOptions, SessionManager, Submission};
