//! Action-driven transitions of the shared extraction state.
//!
//! The updater holds no state of its own. The QA store and action log are
//! owned by the caller for the whole file, the history only for the current
//! window; all three are passed in by reference.

use tracing::{info, warn};

use crate::core::action::{Action, ActionPayload};
use crate::core::qa_store::QaStore;
use crate::core::types::{ActionLogEntry, HistoryEntry};

/// Whether the window keeps issuing oracle calls after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFlow {
    Continue,
    Complete,
}

/// Mutable state an action is applied to.
pub struct ExtractionState<'a> {
    pub qa_store: &'a mut QaStore,
    pub history: &'a mut Vec<HistoryEntry>,
    pub action_log: &'a mut Vec<ActionLogEntry>,
}

/// Where the round-trip that produced an action sits within the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTrip {
    pub window_index: usize,
    pub iteration: u32,
}

/// Apply one parsed action.
///
/// The action log always gains an entry first, whatever the action. Known
/// actions then update the store and append a redacted history entry;
/// unrecognized actions are logged and otherwise ignored.
pub fn apply_action(
    payload: &ActionPayload,
    thinking: &str,
    at: RoundTrip,
    state: &mut ExtractionState<'_>,
) -> WindowFlow {
    state.action_log.push(ActionLogEntry::accepted(
        at.window_index,
        at.iteration,
        thinking,
        payload,
    ));

    match &payload.action {
        Action::EnrichExisting {
            target_qa_index,
            question,
            answer,
        } => {
            match target_qa_index {
                Some(index) => enrich(state.qa_store, *index, question, answer),
                None => warn!("enrich_existing without a usable target_qa_index"),
            }
            push_history(state.history, payload, *target_qa_index);
            WindowFlow::Continue
        }
        Action::AddNewQa { question, answer } => {
            let qa_index = state.qa_store.push_new(
                question.clone().unwrap_or_default(),
                answer.clone().unwrap_or_default(),
            );
            push_history(state.history, payload, None);
            info!(qa_index, "added QA record");
            WindowFlow::Continue
        }
        Action::WindowComplete => {
            push_history(state.history, payload, None);
            info!("window marked complete");
            WindowFlow::Complete
        }
        Action::Unrecognized { tag } => {
            warn!(tag = tag.as_deref().unwrap_or("<missing>"), "unrecognized action ignored");
            WindowFlow::Continue
        }
    }
}

/// Overwrite only the non-empty fields of the matching record.
fn enrich(store: &mut QaStore, index: u64, question: &Option<String>, answer: &Option<String>) {
    let Some(record) = store.find_mut(index) else {
        warn!(qa_index = index, "enrich_existing target not found");
        return;
    };
    if let Some(question) = question.as_deref().filter(|text| !text.is_empty()) {
        record.question = question.to_string();
    }
    if let Some(answer) = answer.as_deref().filter(|text| !text.is_empty()) {
        record.answer = answer.to_string();
    }
}

fn push_history(history: &mut Vec<HistoryEntry>, payload: &ActionPayload, target: Option<u64>) {
    if let Some(action) = payload.action.tag() {
        history.push(HistoryEntry {
            action,
            reasoning: payload.reasoning.clone(),
            target_qa_index: target,
        });
    }
}
