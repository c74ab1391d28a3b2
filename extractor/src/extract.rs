//! Windowed incremental extraction for a single transcript.
//!
//! [`WindowController`] partitions the turns into token-budgeted windows and
//! runs a bounded oracle loop per window. The QA store and the action log live
//! for the whole file; the history list is recreated for every window.

use anyhow::{Result, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::parser::parse_response;
use crate::core::qa_store::QaStore;
use crate::core::state_update::{ExtractionState, RoundTrip, WindowFlow, apply_action};
use crate::core::tokens::TokenCounter;
use crate::core::types::{
    ActionLogEntry, FileResult, HistoryEntry, ProcessingConfig, Turn, WindowStop, WindowSummary,
};
use crate::core::window::{Window, build_windows};
use crate::io::oracle::Oracle;
use crate::io::prompt::{PromptEngine, PromptInputs};

/// Caller-supplied engine parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionConfig {
    /// Token budget per window.
    pub window_length: usize,
    /// Oracle round-trips allowed per window.
    pub max_iterations_per_window: u32,
    /// Model identifier echoed into the output record.
    pub model_name: String,
}

impl ExtractionConfig {
    fn processing_config(&self) -> ProcessingConfig {
        ProcessingConfig {
            window_length: self.window_length,
            max_iterations_per_window: self.max_iterations_per_window,
            model_name: self.model_name.clone(),
        }
    }
}

/// Outcome of one file: the persisted record plus per-window bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct FileExtraction {
    pub result: FileResult,
    pub windows: Vec<WindowSummary>,
}

/// Drives the oracle over every window of a transcript.
pub struct WindowController<'a, O: Oracle + ?Sized> {
    oracle: &'a O,
    counter: &'a dyn TokenCounter,
    prompts: &'a PromptEngine,
    config: &'a ExtractionConfig,
}

impl<'a, O: Oracle + ?Sized> WindowController<'a, O> {
    pub fn new(
        oracle: &'a O,
        counter: &'a dyn TokenCounter,
        prompts: &'a PromptEngine,
        config: &'a ExtractionConfig,
    ) -> Self {
        Self {
            oracle,
            counter,
            prompts,
            config,
        }
    }

    /// Partition `turns` with this controller's budget and token counter.
    pub fn windows<'t>(&self, turns: &'t [Turn]) -> Vec<Window<'t>> {
        build_windows(turns, self.config.window_length, self.counter)
    }

    /// Extract QA records from one transcript.
    ///
    /// Oracle and parse failures only end the affected window. An `Err` means
    /// the file itself could not be processed (invalid parameters or a prompt
    /// that failed to render).
    #[instrument(skip_all, fields(file = %filename, turns = turns.len()))]
    pub fn extract_file(&self, filename: &str, turns: &[Turn]) -> Result<FileExtraction> {
        if self.config.window_length == 0 {
            bail!("window_length must be > 0");
        }
        if self.config.max_iterations_per_window == 0 {
            bail!("max_iterations_per_window must be > 0");
        }

        let windows = self.windows(turns);
        info!(windows = windows.len(), "processing file");

        let mut qa_store = QaStore::new();
        let mut action_log = Vec::new();
        let mut summaries = Vec::with_capacity(windows.len());

        for (index, window) in windows.iter().enumerate() {
            let summary = self.run_window(index, window, &mut qa_store, &mut action_log)?;
            summaries.push(summary);
        }

        info!(
            qa_count = qa_store.len(),
            iterations = action_log.len(),
            "file processed"
        );
        let result = FileResult {
            filename: filename.to_string(),
            total_windows: windows.len(),
            total_iterations: action_log.len(),
            qa_count: qa_store.len(),
            qa_list: qa_store.into_records(),
            full_actions: action_log,
            processing_config: self.config.processing_config(),
        };
        Ok(FileExtraction {
            result,
            windows: summaries,
        })
    }

    #[instrument(skip_all, fields(window = index, turns = window.turns.len(), tokens = window.tokens))]
    fn run_window(
        &self,
        index: usize,
        window: &Window<'_>,
        qa_store: &mut QaStore,
        action_log: &mut Vec<ActionLogEntry>,
    ) -> Result<WindowSummary> {
        let context_window = window.text();
        let mut history: Vec<HistoryEntry> = Vec::new();
        let mut iteration = 0;
        let mut stop = WindowStop::IterationCap;

        while iteration < self.config.max_iterations_per_window {
            iteration += 1;
            let messages = self.prompts.messages(&PromptInputs {
                qa_store: &*qa_store,
                history: &history,
                context_window: &context_window,
            })?;

            let raw = match self.oracle.complete(&messages) {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(iteration, err = %err, "oracle unavailable, abandoning window");
                    action_log.push(ActionLogEntry::oracle_failure(
                        index,
                        iteration,
                        &err.to_string(),
                    ));
                    stop = WindowStop::OracleUnavailable;
                    break;
                }
            };
            debug!(iteration, raw = %raw, "oracle reply");

            let parsed = parse_response(&raw);
            let Some(payload) = parsed.action else {
                warn!(iteration, "no action in oracle reply, abandoning window");
                action_log.push(ActionLogEntry::parse_failure(
                    index,
                    iteration,
                    &parsed.thinking,
                    &raw,
                ));
                stop = WindowStop::ParseFailure;
                break;
            };

            let flow = apply_action(
                &payload,
                &parsed.thinking,
                RoundTrip {
                    window_index: index,
                    iteration,
                },
                &mut ExtractionState {
                    qa_store: &mut *qa_store,
                    history: &mut history,
                    action_log: &mut *action_log,
                },
            );
            if flow == WindowFlow::Complete {
                stop = WindowStop::Completed;
                break;
            }
        }

        if stop == WindowStop::IterationCap {
            warn!(
                iterations = iteration,
                "iteration cap reached without window_complete"
            );
        }

        Ok(WindowSummary {
            index,
            turns: window.turns.len(),
            tokens: window.tokens,
            iterations: iteration,
            stop,
        })
    }
}
