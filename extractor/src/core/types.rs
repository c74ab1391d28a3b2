//! Shared deterministic types for the extraction engine.
//!
//! These types define stable contracts between the window builder, the
//! response parser, the state updater and the persisted output record. They do
//! not depend on external state or I/O.

use serde::{Deserialize, Serialize};

use crate::core::action::{ActionPayload, ActionTag};
use crate::core::qa_store::QaRecord;

/// One speaker utterance, the atomic unit of an input transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: String,
    pub content: String,
}

impl Turn {
    pub fn new(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
        }
    }

    /// Line used both for token counting and for the prompt context window.
    pub fn formatted(&self) -> String {
        format!("{}: {}", self.speaker, self.content)
    }
}

/// Redacted projection of an accepted action, kept only for the current window.
///
/// Question and answer text are omitted; the full payload lives in the action log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: ActionTag,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_qa_index: Option<u64>,
}

/// One oracle round-trip in the append-only audit trail of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    /// 0-based window the round-trip belongs to.
    pub window_index: usize,
    /// 1-based iteration within the window.
    pub iteration: u32,
    pub thinking_process: String,
    pub action_data: Option<ActionPayload>,
    pub parsing_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle_error: Option<String>,
}

impl ActionLogEntry {
    /// Entry for a reply that yielded a well-formed action.
    pub fn accepted(
        window_index: usize,
        iteration: u32,
        thinking: &str,
        payload: &ActionPayload,
    ) -> Self {
        Self {
            window_index,
            iteration,
            thinking_process: thinking.to_string(),
            action_data: Some(payload.clone()),
            parsing_error: false,
            raw_response: None,
            oracle_error: None,
        }
    }

    /// Entry for a reply no action could be extracted from.
    ///
    /// Falls back to the whole reply as the thinking text when no thinking
    /// section was found.
    pub fn parse_failure(window_index: usize, iteration: u32, thinking: &str, raw: &str) -> Self {
        let thinking_process = if thinking.is_empty() { raw } else { thinking };
        Self {
            window_index,
            iteration,
            thinking_process: thinking_process.to_string(),
            action_data: None,
            parsing_error: true,
            raw_response: Some(raw.to_string()),
            oracle_error: None,
        }
    }

    /// Entry for an oracle call that failed or timed out.
    pub fn oracle_failure(window_index: usize, iteration: u32, error: &str) -> Self {
        Self {
            window_index,
            iteration,
            thinking_process: String::new(),
            action_data: None,
            parsing_error: false,
            raw_response: None,
            oracle_error: Some(error.to_string()),
        }
    }
}

/// Why a window stopped issuing oracle calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStop {
    /// The oracle declared `window_complete`.
    Completed,
    /// `max_iterations_per_window` round-trips ran without completion.
    IterationCap,
    /// The oracle failed or timed out; remaining iterations were skipped.
    OracleUnavailable,
    /// A reply held no parseable action; remaining iterations were skipped.
    ParseFailure,
}

/// Per-window bookkeeping returned next to the persisted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSummary {
    pub index: usize,
    pub turns: usize,
    pub tokens: usize,
    pub iterations: u32,
    pub stop: WindowStop,
}

/// Echo of the run configuration stored in every output record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub window_length: usize,
    pub max_iterations_per_window: u32,
    pub model_name: String,
}

/// Persisted result for one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResult {
    pub filename: String,
    pub total_windows: usize,
    pub total_iterations: usize,
    pub qa_count: usize,
    pub qa_list: Vec<QaRecord>,
    pub full_actions: Vec<ActionLogEntry>,
    pub processing_config: ProcessingConfig,
}
