//! Shared test helpers for loop and session tests.

use cloudwarden_core::error::{ExecutionError, ProviderError};
use cloudwarden_core::message::{Message, MessageToolCall};
use cloudwarden_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use cloudwarden_security::{CommandOutput, ShellRunner};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A mock provider that replays scripted responses in order.
///
/// Once the script runs out it repeats `fallback` if one is set, otherwise
/// every further call fails, so a test can count exactly how many requests
/// a loop made.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<ProviderResponse>>,
    fallback: Option<ProviderResponse>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the same response.
    pub fn repeating(response: ProviderResponse) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        next.or_else(|| self.fallback.clone()).ok_or(ProviderError::ApiError {
            status_code: 500,
            message: "script exhausted".into(),
        })
    }
}

/// A provider whose backend is always down.
pub struct FailingProvider;

#[async_trait::async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

pub fn text(content: &str) -> ProviderResponse {
    response(Message::assistant(content))
}

pub fn tool_call(name: &str, arguments: serde_json::Value) -> ProviderResponse {
    tool_calls(&[(name, arguments)])
}

pub fn tool_calls(calls: &[(&str, serde_json::Value)]) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls = calls
        .iter()
        .enumerate()
        .map(|(i, (name, arguments))| MessageToolCall {
            id: format!("call_{i}"),
            name: name.to_string(),
            arguments: arguments.to_string(),
        })
        .collect();
    response(message)
}

/// A tool call whose argument string is not valid JSON.
pub fn raw_tool_call(name: &str, arguments: &str) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls = vec![MessageToolCall {
        id: "call_raw".into(),
        name: name.into(),
        arguments: arguments.into(),
    }];
    response(message)
}

fn response(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Records every spawned command and replies with a canned output.
pub struct RecordingRunner {
    reply: CommandOutput,
    commands: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn new(reply: CommandOutput) -> Self {
        Self {
            reply,
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ShellRunner for RecordingRunner {
    async fn spawn(&self, command: &str, _env: &[(String, String)]) -> Result<CommandOutput, ExecutionError> {
        self.commands.lock().unwrap().push(command.to_string());
        Ok(self.reply.clone())
    }
}
