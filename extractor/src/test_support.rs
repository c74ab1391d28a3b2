//! Test-only helpers: a scripted oracle, canned replies and scratch directories.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::core::types::Turn;
use crate::io::oracle::{Message, Oracle, OracleError, Role};

/// Oracle that replays queued replies in order and records every prompt.
///
/// Once the queue is empty every call fails as unavailable.
pub struct ScriptedOracle {
    replies: RefCell<VecDeque<Result<String, OracleError>>>,
    received: RefCell<Vec<Vec<Message>>>,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<Result<String, OracleError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            received: RefCell::new(Vec::new()),
        }
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.received.borrow().len()
    }

    /// Replies not consumed yet.
    pub fn remaining(&self) -> usize {
        self.replies.borrow().len()
    }

    /// User message content of every call, in call order.
    pub fn user_prompts(&self) -> Vec<String> {
        self.received
            .borrow()
            .iter()
            .filter_map(|messages| {
                messages
                    .iter()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.clone())
            })
            .collect()
    }
}

impl Oracle for ScriptedOracle {
    fn complete(&self, messages: &[Message]) -> Result<String, OracleError> {
        self.received.borrow_mut().push(messages.to_vec());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Command("script exhausted".to_string())))
    }
}

/// A failure the controller must treat as oracle unavailability.
pub fn unavailable() -> OracleError {
    OracleError::Timeout(Duration::from_secs(1))
}

/// Well-formed reply carrying `action` as a tagged JSON block.
pub fn reply(thinking: &str, action: &Value) -> String {
    format!("## 思考过程：\n{thinking}\n## 最终输出：\n```json\n{action:#}\n```")
}

pub fn add_reply(question: &str, answer: &str) -> String {
    reply(
        "new topic",
        &json!({
            "action": "add_new_QA",
            "question": question,
            "answer": answer,
            "reasoning": "not covered yet",
        }),
    )
}

pub fn enrich_reply(target: u64, question: Option<&str>, answer: Option<&str>) -> String {
    let mut action = json!({
        "action": "enrich_existing",
        "target_qa_index": target,
        "reasoning": "adds detail",
    });
    if let Some(question) = question {
        action["question"] = json!(question);
    }
    if let Some(answer) = answer {
        action["answer"] = json!(answer);
    }
    reply("extends an existing record", &action)
}

pub fn complete_reply() -> String {
    reply(
        "nothing left in this window",
        &json!({"action": "window_complete", "reasoning": "done"}),
    )
}

pub fn turn(speaker: &str, content: &str) -> Turn {
    Turn::new(speaker, content)
}

/// Whitespace-separated word count, so token budgets in tests are exact.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Scratch directory with `input/` and `output/` subdirectories.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        fs::create_dir_all(dir.path().join("input")).context("create input dir")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn input_dir(&self) -> PathBuf {
        self.dir.path().join("input")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    /// Write `turns` as `input/<name>` and return the path.
    pub fn write_transcript(&self, name: &str, turns: &[Turn]) -> Result<PathBuf> {
        let path = self.input_dir().join(name);
        let payload = serde_json::to_string_pretty(turns).context("serialize transcript")?;
        fs::write(&path, payload).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Write arbitrary bytes as `input/<name>`.
    pub fn write_raw(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.input_dir().join(name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}
