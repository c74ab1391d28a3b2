//! Prompt rendering for extraction iterations.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::qa_store::QaStore;
use crate::core::types::HistoryEntry;
use crate::io::oracle::Message;

const EXTRACTION_TEMPLATE: &str = include_str!("prompts/extraction.md");
const TEMPLATE_NAME: &str = "extraction";

/// System message used when the configuration does not override it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Everything that varies between two iterations' prompts.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub qa_store: &'a QaStore,
    pub history: &'a [HistoryEntry],
    pub context_window: &'a str,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
    system_prompt: String,
}

impl PromptEngine {
    /// Engine using the built-in extraction template.
    pub fn new(system_prompt: impl Into<String>) -> Result<Self> {
        Self::with_template(EXTRACTION_TEMPLATE.to_string(), system_prompt)
    }

    /// Engine using a template loaded from disk.
    pub fn from_template_file(path: &Path, system_prompt: impl Into<String>) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("read prompt template {}", path.display()))?;
        Self::with_template(source, system_prompt)
            .with_context(|| format!("compile prompt template {}", path.display()))
    }

    pub fn with_template(source: String, system_prompt: impl Into<String>) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template_owned(TEMPLATE_NAME, source)
            .context("add extraction template")?;
        Ok(Self {
            env,
            system_prompt: system_prompt.into(),
        })
    }

    /// Render the user prompt for one iteration.
    pub fn render(&self, inputs: &PromptInputs<'_>) -> Result<String> {
        let template = self.env.get_template(TEMPLATE_NAME)?;
        let rendered = template
            .render(context! {
                qa_list => pretty_json(inputs.qa_store)?,
                history_actions => pretty_json(inputs.history)?,
                context_window => inputs.context_window,
            })
            .context("render extraction prompt")?;
        Ok(rendered)
    }

    /// System message followed by the rendered user prompt.
    pub fn messages(&self, inputs: &PromptInputs<'_>) -> Result<Vec<Message>> {
        Ok(vec![
            Message::system(self.system_prompt.clone()),
            Message::user(self.render(inputs)?),
        ])
    }
}

/// Pretty JSON with non-ASCII text left as is; empty collections render as `[]`.
fn pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serialize prompt section")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::ActionTag;
    use crate::io::oracle::Role;

    fn engine() -> PromptEngine {
        PromptEngine::new(DEFAULT_SYSTEM_PROMPT).expect("engine")
    }

    #[test]
    fn empty_state_renders_empty_arrays() {
        let store = QaStore::new();
        let rendered = engine()
            .render(&PromptInputs {
                qa_store: &store,
                history: &[],
                context_window: "host: hello",
            })
            .expect("render");

        assert!(rendered.contains("## Existing QA records\n[]"));
        assert!(rendered.contains("## Actions taken in this window\n[]"));
        assert!(rendered.contains("host: hello"));
    }

    /// Chinese text is passed through verbatim rather than escaped.
    #[test]
    fn qa_list_keeps_non_ascii() {
        let mut store = QaStore::new();
        store.push_new("什么是存在？".into(), "存在即被感知。".into());
        let rendered = engine()
            .render(&PromptInputs {
                qa_store: &store,
                history: &[],
                context_window: "",
            })
            .expect("render");

        assert!(rendered.contains("什么是存在？"));
        assert!(rendered.contains("\"qa_index\": 0"));
    }

    #[test]
    fn history_renders_tags() {
        let store = QaStore::new();
        let history = vec![HistoryEntry {
            action: ActionTag::EnrichExisting,
            reasoning: "more detail".to_string(),
            target_qa_index: Some(2),
        }];
        let rendered = engine()
            .render(&PromptInputs {
                qa_store: &store,
                history: &history,
                context_window: "",
            })
            .expect("render");

        assert!(rendered.contains("\"action\": \"enrich_existing\""));
        assert!(rendered.contains("\"target_qa_index\": 2"));
    }

    #[test]
    fn messages_are_system_then_user() {
        let store = QaStore::new();
        let messages = PromptEngine::new("be terse")
            .expect("engine")
            .messages(&PromptInputs {
                qa_store: &store,
                history: &[],
                context_window: "a: b",
            })
            .expect("messages");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "be terse");
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn custom_template_file_is_used() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("custom.md");
        fs::write(&path, "WINDOW={{ context_window }}").expect("write template");
        let store = QaStore::new();

        let rendered = PromptEngine::from_template_file(&path, DEFAULT_SYSTEM_PROMPT)
            .expect("engine")
            .render(&PromptInputs {
                qa_store: &store,
                history: &[],
                context_window: "x: y",
            })
            .expect("render");
        assert_eq!(rendered, "WINDOW=x: y");
    }

    #[test]
    fn broken_template_is_rejected() {
        let err = PromptEngine::with_template("{% if %}".to_string(), "s")
            .err()
            .expect("error");
        assert!(err.to_string().contains("extraction template"));
    }
}
