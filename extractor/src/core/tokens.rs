//! Token estimation used to budget windows.
//!
//! Exact model tokenizers are not needed to keep windows under the oracle's
//! context budget; these heuristics are deterministic and cheap.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default characters per token for [`CharRatioCounter`].
pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

/// Tokens attributed to one Latin word by [`CjkAwareCounter`].
const TOKENS_PER_WORD: f64 = 1.3;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z]+").expect("valid word regex"));

/// Counts tokens in a piece of text.
pub trait TokenCounter {
    fn count(&self, text: &str) -> usize;
}

impl<F> TokenCounter for F
where
    F: Fn(&str) -> usize,
{
    fn count(&self, text: &str) -> usize {
        self(text)
    }
}

/// `chars / chars_per_token`, floored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharRatioCounter {
    pub chars_per_token: usize,
}

impl Default for CharRatioCounter {
    fn default() -> Self {
        Self {
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
        }
    }
}

impl TokenCounter for CharRatioCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count() / self.chars_per_token.max(1)
    }
}

/// 1.3 tokens per Latin word plus one token per other non-whitespace character.
///
/// Ideographs, kana, hangul, digits and punctuation (full-width or not) all
/// count one token each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CjkAwareCounter;

impl TokenCounter for CjkAwareCounter {
    fn count(&self, text: &str) -> usize {
        let words = WORD_RE.find_iter(text).count();
        let others = text
            .chars()
            .filter(|c| !c.is_whitespace() && !c.is_ascii_alphabetic())
            .count();
        others + (words as f64 * TOKENS_PER_WORD) as usize
    }
}

/// Heuristic selected by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    #[default]
    Cjk,
    Chars,
}

impl TokenizerKind {
    pub fn counter(self) -> Box<dyn TokenCounter> {
        match self {
            TokenizerKind::Cjk => Box::new(CjkAwareCounter),
            TokenizerKind::Chars => Box::new(CharRatioCounter::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_ratio_floors() {
        let counter = CharRatioCounter::default();
        assert_eq!(counter.count("abcdefg"), 1);
        assert_eq!(counter.count("abcdefgh"), 2);
        assert_eq!(counter.count(""), 0);
    }

    /// Multibyte characters count once each, not per byte.
    #[test]
    fn char_ratio_counts_chars_not_bytes() {
        let counter = CharRatioCounter { chars_per_token: 1 };
        assert_eq!(counter.count("你好"), 2);
    }

    #[test]
    fn cjk_counter_mixes_ideographs_and_words() {
        // 4 ideographs + 2 words * 1.3 = 6.6 -> 6
        assert_eq!(CjkAwareCounter.count("我们讨论 hello world"), 6);
        // 3 words * 1.3 = 3.9 -> 3, plus the colon
        assert_eq!(CjkAwareCounter.count("host: hello world"), 4);
    }

    /// Scripts and symbols outside ideographs and Latin words still cost tokens.
    #[test]
    fn cjk_counter_counts_every_other_visible_char() {
        assert_eq!(CjkAwareCounter.count("，。？！：；"), 6);
        assert_eq!(CjkAwareCounter.count("こんにちは、ありがとう"), 11);
        assert_eq!(CjkAwareCounter.count("안녕하세요 감사합니다"), 10);
        assert_eq!(CjkAwareCounter.count("１２３４５"), 5);
        assert_eq!(CjkAwareCounter.count("2024 12 31"), 8);
        assert_eq!(CjkAwareCounter.count(" \t\n"), 0);
    }

    #[test]
    fn closures_are_counters() {
        let words = |text: &str| text.split_whitespace().count();
        assert_eq!(words.count("a b c"), 3);
    }
}
