//! Oracle abstraction for text completion.
//!
//! The [`Oracle`] trait decouples window orchestration from the completion
//! backend. [`ChatCompletionOracle`] talks to an OpenAI-compatible HTTP
//! endpoint and [`CommandOracle`] pipes the conversation through a local
//! command; tests use scripted oracles that replay canned replies.

use std::process::Command;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::io::process::run_command_with_timeout;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One role-tagged message sent to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Every way an oracle call can fail. All of them mean "unavailable".
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("oracle response was malformed: {0}")]
    Malformed(String),

    #[error("oracle returned an empty completion")]
    EmptyCompletion,

    #[error("oracle command failed: {0}")]
    Command(String),
}

/// A text-reasoning service: role-tagged messages in, one free-text completion out.
pub trait Oracle {
    fn complete(&self, messages: &[Message]) -> Result<String, OracleError>;
}

impl<O: Oracle + ?Sized> Oracle for &O {
    fn complete(&self, messages: &[Message]) -> Result<String, OracleError> {
        (**self).complete(messages)
    }
}

impl<O: Oracle + ?Sized> Oracle for Box<O> {
    fn complete(&self, messages: &[Message]) -> Result<String, OracleError> {
        (**self).complete(messages)
    }
}

/// Settings for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for OpenAI-compatible chat completion APIs.
pub struct ChatCompletionOracle {
    settings: ChatCompletionSettings,
    client: reqwest::blocking::Client,
}

impl ChatCompletionOracle {
    pub fn new(settings: ChatCompletionSettings) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(OracleError::Transport)?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }
}

impl Oracle for ChatCompletionOracle {
    #[instrument(skip_all, fields(model = %self.settings.model, messages = messages.len()))]
    fn complete(&self, messages: &[Message]) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.settings.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().map_err(|err| self.classify(err))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "oracle returned error status");
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().map_err(|err| {
            if err.is_timeout() {
                OracleError::Timeout(self.settings.timeout)
            } else {
                OracleError::Malformed(err.to_string())
            }
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OracleError::Malformed("response has no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(OracleError::EmptyCompletion);
        }
        debug!(bytes = content.len(), "oracle completion received");
        Ok(content)
    }
}

impl ChatCompletionOracle {
    fn classify(&self, err: reqwest::Error) -> OracleError {
        if err.is_timeout() {
            OracleError::Timeout(self.settings.timeout)
        } else {
            OracleError::Transport(err)
        }
    }
}

/// Settings for a local command that reads a prompt on stdin and prints a completion.
#[derive(Debug, Clone)]
pub struct CommandSettings {
    /// Program followed by its arguments.
    pub command: Vec<String>,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// Oracle backed by a child process.
pub struct CommandOracle {
    settings: CommandSettings,
}

impl CommandOracle {
    pub fn new(settings: CommandSettings) -> Self {
        Self { settings }
    }
}

impl Oracle for CommandOracle {
    #[instrument(skip_all, fields(program = ?self.settings.command.first()))]
    fn complete(&self, messages: &[Message]) -> Result<String, OracleError> {
        let (program, args) = self
            .settings
            .command
            .split_first()
            .ok_or_else(|| OracleError::Command("empty command".to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(args);

        let transcript = render_conversation(messages);
        let output = run_command_with_timeout(
            cmd,
            Some(transcript.as_bytes()),
            self.settings.timeout,
            self.settings.output_limit_bytes,
        )
        .map_err(|err| OracleError::Command(format!("{err:#}")))?;

        if output.timed_out {
            return Err(OracleError::Timeout(self.settings.timeout));
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OracleError::Command(format!(
                "exit status {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let content = String::from_utf8_lossy(&output.stdout).into_owned();
        if content.trim().is_empty() {
            return Err(OracleError::EmptyCompletion);
        }
        Ok(content)
    }
}

/// Flatten messages into one prompt: system content first, then the user turn.
fn render_conversation(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|message| message.content.trim())
        .filter(|content| !content.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
