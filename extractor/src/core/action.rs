//! Typed actions returned by the oracle.
//!
//! The oracle emits a loosely shaped JSON object such as
//! `{"action": "add_new_QA", "question": "...", "answer": "...", "reasoning": "..."}`.
//! Conversion into [`ActionPayload`] is tolerant: unknown tags become
//! [`Action::Unrecognized`], indices may arrive as strings, and absent text
//! fields stay `None`. The decoded object itself is kept and serialized
//! unchanged, and the same conversion backs deserialization, so a persisted
//! action log reloads into identical values.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// Wire tags of the actions the state updater understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionTag {
    #[serde(rename = "enrich_existing")]
    EnrichExisting,
    #[serde(rename = "add_new_QA")]
    AddNewQa,
    #[serde(rename = "window_complete")]
    WindowComplete,
}

impl ActionTag {
    pub const ALL: [ActionTag; 3] = [
        ActionTag::EnrichExisting,
        ActionTag::AddNewQa,
        ActionTag::WindowComplete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionTag::EnrichExisting => "enrich_existing",
            ActionTag::AddNewQa => "add_new_QA",
            ActionTag::WindowComplete => "window_complete",
        }
    }

    /// Match a raw tag, ignoring surrounding whitespace and ASCII case.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(trimmed))
    }
}

/// One instruction from the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Amend an existing record; only non-empty fields overwrite.
    EnrichExisting {
        target_qa_index: Option<u64>,
        question: Option<String>,
        answer: Option<String>,
    },
    /// Append a record at the next free index.
    AddNewQa {
        question: Option<String>,
        answer: Option<String>,
    },
    /// End the current window.
    WindowComplete,
    /// Any tag outside the known set, or no tag at all.
    Unrecognized { tag: Option<String> },
}

impl Action {
    pub fn tag(&self) -> Option<ActionTag> {
        match self {
            Action::EnrichExisting { .. } => Some(ActionTag::EnrichExisting),
            Action::AddNewQa { .. } => Some(ActionTag::AddNewQa),
            Action::WindowComplete => Some(ActionTag::WindowComplete),
            Action::Unrecognized { .. } => None,
        }
    }

    /// Label for logs: the known tag, the raw unknown tag, or `<missing>`.
    pub fn label(&self) -> &str {
        match self {
            Action::Unrecognized { tag: Some(tag) } => tag,
            Action::Unrecognized { tag: None } => "<missing>",
            known => known.tag().map(ActionTag::as_str).unwrap_or("<missing>"),
        }
    }
}

/// An action plus the oracle's free-text justification.
///
/// `action` and `reasoning` drive the state updater; the object the oracle
/// actually sent is kept alongside and is what gets serialized, so unknown
/// tags, unusable indices and extra keys survive into the action log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Value")]
pub struct ActionPayload {
    pub action: Action,
    pub reasoning: String,
    raw: Map<String, Value>,
}

#[derive(Debug, Error)]
#[error("action payload must be a JSON object, got {kind}")]
pub struct NotAnObject {
    kind: &'static str,
}

impl TryFrom<Value> for ActionPayload {
    type Error = NotAnObject;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self::from_object(map)),
            other => Err(NotAnObject {
                kind: json_kind(&other),
            }),
        }
    }
}

impl ActionPayload {
    /// Payload for a typed action, with the equivalent flat object as its raw form.
    pub fn new(action: Action, reasoning: impl Into<String>) -> Self {
        let reasoning = reasoning.into();
        let raw = flatten(&action, &reasoning);
        Self {
            action,
            reasoning,
            raw,
        }
    }

    /// Build a payload from a decoded JSON object without rejecting anything.
    pub fn from_object(map: Map<String, Value>) -> Self {
        let reasoning = text_field(&map, "reasoning").unwrap_or_default();
        let question = text_field(&map, "question");
        let answer = text_field(&map, "answer");

        let action = match map.get("action") {
            None | Some(Value::Null) => Action::Unrecognized { tag: None },
            Some(Value::String(raw)) => match ActionTag::parse(raw) {
                Some(ActionTag::EnrichExisting) => Action::EnrichExisting {
                    target_qa_index: target_index(&map),
                    question,
                    answer,
                },
                Some(ActionTag::AddNewQa) => Action::AddNewQa { question, answer },
                Some(ActionTag::WindowComplete) => Action::WindowComplete,
                None => Action::Unrecognized {
                    tag: Some(raw.clone()),
                },
            },
            Some(other) => Action::Unrecognized {
                tag: Some(other.to_string()),
            },
        };

        Self {
            action,
            reasoning,
            raw: map,
        }
    }

    /// The object as the oracle sent it.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }
}

impl Serialize for ActionPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

/// Flat wire object for a typed action.
fn flatten(action: &Action, reasoning: &str) -> Map<String, Value> {
    let mut map = Map::new();
    match action {
        Action::EnrichExisting {
            target_qa_index,
            question,
            answer,
        } => {
            map.insert("action".into(), ActionTag::EnrichExisting.as_str().into());
            map.insert("target_qa_index".into(), (*target_qa_index).into());
            insert_text(&mut map, "question", question);
            insert_text(&mut map, "answer", answer);
        }
        Action::AddNewQa { question, answer } => {
            map.insert("action".into(), ActionTag::AddNewQa.as_str().into());
            insert_text(&mut map, "question", question);
            insert_text(&mut map, "answer", answer);
        }
        Action::WindowComplete => {
            map.insert("action".into(), ActionTag::WindowComplete.as_str().into());
        }
        Action::Unrecognized { tag } => {
            if let Some(tag) = tag {
                map.insert("action".into(), tag.as_str().into());
            }
        }
    }
    map.insert("reasoning".into(), reasoning.into());
    map
}

fn insert_text(map: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(text) = value {
        map.insert(key.to_string(), text.as_str().into());
    }
}

/// Read a text field, stringifying scalars the oracle emitted unquoted.
fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn target_index(map: &Map<String, Value>) -> Option<u64> {
    let raw = map.get("target_qa_index")?;
    if raw.is_null() {
        return None;
    }
    let parsed = match raw {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|value| value.fract() == 0.0 && *value >= 0.0 && *value <= u64::MAX as f64)
                .map(|value| value as u64)
        }),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    if parsed.is_none() {
        warn!(raw = %raw, "ignoring invalid target_qa_index");
    }
    parsed
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
