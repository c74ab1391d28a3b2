//! Tolerant extraction of thinking text and an action from free-text replies.
//!
//! The oracle has no hard format guarantee, so both halves of a reply are
//! recovered through an ordered list of strategies. Each strategy looks only
//! at its first match and the first one that succeeds wins. This is a
//! best-effort heuristic, not a grammar: a reply none of the strategies
//! understand yields `action: None`, which callers treat as a normal outcome.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::core::action::ActionPayload;

const THINKING_MARKER: &str = r"##\s*(?:思考过程|(?i:thinking(?:\s+process)?))\s*[：:]";
const OUTPUT_MARKER: &str = r"##\s*(?:最终输出|(?i:final\s+output))\s*[：:]";

static THINKING_DELIMITED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?s){THINKING_MARKER}(.*?){OUTPUT_MARKER}"))
        .expect("valid thinking regex")
});

static THINKING_UNTIL_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?s){THINKING_MARKER}(.*?)```")).expect("valid thinking regex")
});

static TAGGED_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?i:json)\s*(.*?)\s*```").expect("valid fence regex"));

static ANY_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\s*(.*?)\s*```").expect("valid fence regex"));

static BRACE_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid object regex"));

/// Ways to recover the thinking narrative, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingStrategy {
    /// Text between the thinking marker and the final-output marker.
    Delimited,
    /// Text between the thinking marker and the first code fence.
    UntilFence,
    /// Everything before the first code fence, when the fence is not at the start.
    BeforeFence,
}

impl ThinkingStrategy {
    pub const ORDER: [ThinkingStrategy; 3] = [
        ThinkingStrategy::Delimited,
        ThinkingStrategy::UntilFence,
        ThinkingStrategy::BeforeFence,
    ];

    fn extract(self, raw: &str) -> Option<String> {
        let found = match self {
            ThinkingStrategy::Delimited => capture(&THINKING_DELIMITED_RE, raw),
            ThinkingStrategy::UntilFence => capture(&THINKING_UNTIL_FENCE_RE, raw),
            ThinkingStrategy::BeforeFence => match raw.find("```") {
                Some(pos) if pos > 0 => Some(&raw[..pos]),
                _ => None,
            },
        };
        found.map(|text| text.trim().to_string())
    }
}

/// Ways to locate a candidate action object, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStrategy {
    /// The first code fence tagged `json`.
    TaggedFence,
    /// The first code fence of any kind.
    AnyFence,
    /// The span from the first `{` to the last `}`.
    BraceObject,
}

impl ActionStrategy {
    pub const ORDER: [ActionStrategy; 3] = [
        ActionStrategy::TaggedFence,
        ActionStrategy::AnyFence,
        ActionStrategy::BraceObject,
    ];

    fn candidate(self, raw: &str) -> Option<&str> {
        let found = match self {
            ActionStrategy::TaggedFence => capture(&TAGGED_FENCE_RE, raw),
            ActionStrategy::AnyFence => capture(&ANY_FENCE_RE, raw),
            ActionStrategy::BraceObject => BRACE_OBJECT_RE.find(raw).map(|m| m.as_str()),
        };
        found.map(str::trim)
    }

    /// Decode this strategy's candidate into a payload, if it is a JSON object.
    fn decode(self, raw: &str) -> Option<ActionPayload> {
        let candidate = self.candidate(raw)?;
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => match ActionPayload::try_from(value) {
                Ok(payload) => Some(payload),
                Err(err) => {
                    debug!(strategy = ?self, %err, "candidate rejected");
                    None
                }
            },
            Err(err) => {
                debug!(strategy = ?self, %err, "candidate is not valid json");
                None
            }
        }
    }
}

/// A reply split into its narrative and its action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub thinking: String,
    pub action: Option<ActionPayload>,
    /// Strategy that produced `action`, if any.
    pub strategy: Option<ActionStrategy>,
}

/// Split a raw oracle reply into thinking text and a typed action.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let thinking = ThinkingStrategy::ORDER
        .into_iter()
        .find_map(|strategy| strategy.extract(raw))
        .unwrap_or_default();

    let decoded = ActionStrategy::ORDER
        .into_iter()
        .find_map(|strategy| strategy.decode(raw).map(|payload| (strategy, payload)));

    match decoded {
        Some((strategy, payload)) => {
            debug!(?strategy, action = payload.action.label(), "parsed oracle reply");
            ParsedResponse {
                thinking,
                action: Some(payload),
                strategy: Some(strategy),
            }
        }
        None => ParsedResponse {
            thinking,
            action: None,
            strategy: None,
        },
    }
}

fn capture<'a>(re: &Regex, raw: &'a str) -> Option<&'a str> {
    re.captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
