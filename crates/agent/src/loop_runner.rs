//! The bounded agent loop.
//!
//! One run is a small state machine: ask the model, and either stop on free
//! text or dispatch the single proposed tool call, append its result, and
//! ask again. The loop ends in exactly one of three ways, enumerated by
//! [`LoopOutcome`]; a model failure or an unknown tool name is an error.

use chrono::Utc;
use cloudwarden_core::error::{Error, ToolError};
use cloudwarden_core::event::{DomainEvent, EventSink};
use cloudwarden_core::message::{Conversation, Message};
use cloudwarden_core::provider::{Provider, ProviderRequest};
use cloudwarden_core::tool::{ToolCall, ToolRegistry, ToolResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a loop run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The model answered without asking for a tool
    FinalAnswer(String),

    /// A tool reported that the mission is done
    ToolCompleted { tool_name: String, output: String },

    /// `max_turns` model calls were made without either of the above
    BudgetExceeded { turns: u32 },
}

/// Drives one conversation against the model with a fixed tool catalogue.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    events: Arc<dyn EventSink>,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, events: Arc<dyn EventSink>) -> Self {
        Self {
            provider,
            events,
            temperature: 0.2,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Run the loop for at most `max_turns` model calls.
    ///
    /// `conversation` is extended in place with every model proposal and tool
    /// result, so the caller can inspect the transcript afterwards. Recoverable
    /// tool failures (bad arguments, a handler error) are fed back to the
    /// model as the tool's result; `ToolError::NotFound` ends the run.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        tools: &ToolRegistry,
        model: &str,
        max_turns: u32,
    ) -> Result<LoopOutcome, Error> {
        let tool_definitions = tools.definitions();

        for turn in 1..=max_turns {
            debug!(turn, max_turns, messages = conversation.len(), "Agent loop turn");

            let request = ProviderRequest {
                model: model.to_string(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response = self.provider.complete(request).await?;

            if let Some(usage) = &response.usage {
                self.events.publish(DomainEvent::ResponseGenerated {
                    model: response.model.clone(),
                    tokens_used: usage.total_tokens,
                    timestamp: Utc::now(),
                });
            }

            let mut message = response.message;
            if !message.has_tool_call() {
                let answer = message.content.clone();
                conversation.push(message);
                info!(turn, "Model produced a final answer");
                return Ok(LoopOutcome::FinalAnswer(answer));
            }

            if message.tool_calls.len() > 1 {
                warn!(
                    turn,
                    proposed = message.tool_calls.len(),
                    "Model proposed several tool calls, keeping only the first"
                );
                message.tool_calls.truncate(1);
            }
            let proposed = message.tool_calls[0].clone();
            conversation.push(message);

            let started = std::time::Instant::now();
            let result = match parse_arguments(&proposed.arguments) {
                Ok(arguments) => {
                    let call = ToolCall {
                        id: proposed.id.clone(),
                        name: proposed.name.clone(),
                        arguments,
                    };
                    match tools.dispatch(&call).await {
                        Ok(result) => result,
                        Err(ToolError::NotFound(name)) => {
                            warn!(turn, tool = %name, "Model requested an unknown tool");
                            return Err(ToolError::NotFound(name).into());
                        }
                        Err(e) => {
                            warn!(turn, tool = %proposed.name, error = %e, "Tool call failed");
                            ToolResult::failed(format!("Error: {e}"))
                        }
                    }
                }
                Err(e) => {
                    warn!(turn, tool = %proposed.name, error = %e, "Tool arguments are not valid JSON");
                    ToolResult::failed(format!("Error: arguments must be a JSON object: {e}"))
                }
            };

            self.events.publish(DomainEvent::ToolExecuted {
                tool_name: proposed.name.clone(),
                success: result.success,
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            });

            conversation.push(Message::tool_result(&proposed.id, &proposed.name, &result.output));

            if result.completes_mission {
                info!(turn, tool = %proposed.name, "Tool completed the mission");
                return Ok(LoopOutcome::ToolCompleted {
                    tool_name: proposed.name,
                    output: result.output,
                });
            }
        }

        warn!(max_turns, "Turn budget exhausted");
        Ok(LoopOutcome::BudgetExceeded { turns: max_turns })
    }
}

/// Empty argument strings count as `{}`; anything else must be a JSON object.
fn parse_arguments(raw: &str) -> Result<serde_json::Value, String> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(value) => Err(format!("expected an object, got {value}")),
        Err(e) => Err(e.to_string()),
    }
}
