//! Partitioning of a turn sequence into token-budgeted windows.

use crate::core::tokens::TokenCounter;
use crate::core::types::Turn;

/// A contiguous run of turns processed together.
///
/// `tokens` is the sum of the per-turn counts of each formatted line. It stays
/// within the budget unless the window holds a single oversized turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    pub turns: &'a [Turn],
    pub tokens: usize,
}

impl Window<'_> {
    /// Context window text: one `speaker: content` line per turn.
    pub fn text(&self) -> String {
        self.turns
            .iter()
            .map(Turn::formatted)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Greedily pack turns into windows of at most `budget` tokens.
///
/// A turn is never split. When adding a turn would exceed the budget and the
/// current window already holds something, the window closes and the turn
/// starts the next one; a turn larger than the budget therefore ends up alone
/// in its own window rather than being dropped.
pub fn build_windows<'a, T>(turns: &'a [Turn], budget: usize, counter: &T) -> Vec<Window<'a>>
where
    T: TokenCounter + ?Sized,
{
    let mut windows = Vec::new();
    let mut start = 0;
    let mut tokens = 0;

    for (idx, turn) in turns.iter().enumerate() {
        let turn_tokens = counter.count(&turn.formatted());
        if tokens + turn_tokens > budget && idx > start {
            windows.push(Window {
                turns: &turns[start..idx],
                tokens,
            });
            start = idx;
            tokens = 0;
        }
        tokens += turn_tokens;
    }

    if start < turns.len() {
        windows.push(Window {
            turns: &turns[start..],
            tokens,
        });
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts whitespace-separated words, so the speaker label costs one token.
    fn words(text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn turn_with_words(speaker: &str, content_words: usize) -> Turn {
        Turn::new(speaker, vec!["w"; content_words].join(" "))
    }

    fn concat<'a>(windows: &[Window<'a>]) -> Vec<&'a Turn> {
        windows.iter().flat_map(|window| window.turns.iter()).collect()
    }

    #[test]
    fn empty_input_yields_no_windows() {
        assert!(build_windows(&[], 10, &words).is_empty());
    }

    /// Three ~20-token turns fit a 50-token budget together.
    #[test]
    fn small_turns_share_one_window() {
        let turns = vec![
            turn_with_words("A", 15),
            turn_with_words("B", 15),
            turn_with_words("C", 15),
        ];
        let windows = build_windows(&turns, 50, &words);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].turns.len(), 3);
        assert_eq!(windows[0].tokens, 48);
    }

    /// An oversized turn sits alone; the following turn opens a new window.
    #[test]
    fn oversized_turn_gets_its_own_window() {
        let turns = vec![turn_with_words("A", 39), turn_with_words("B", 4)];
        let windows = build_windows(&turns, 10, &words);

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].turns, &turns[..1]);
        assert_eq!(windows[0].tokens, 40);
        assert_eq!(windows[1].turns, &turns[1..]);
        assert_eq!(windows[1].tokens, 5);
    }

    #[test]
    fn oversized_turn_in_the_middle_closes_previous_window() {
        let turns = vec![
            turn_with_words("A", 2),
            turn_with_words("B", 30),
            turn_with_words("C", 2),
        ];
        let windows = build_windows(&turns, 10, &words);

        let sizes: Vec<usize> = windows.iter().map(|w| w.turns.len()).collect();
        assert_eq!(sizes, vec![1, 1, 1]);
    }

    /// Windows respect the budget (or hold one turn) and concatenate back to the input.
    #[test]
    fn windows_cover_input_in_order_within_budget() {
        let turns: Vec<Turn> = (0..40)
            .map(|idx| turn_with_words(&format!("S{idx}"), (idx * 7) % 13))
            .collect();

        for budget in [1, 5, 12, 30, 1000] {
            let windows = build_windows(&turns, budget, &words);
            for window in &windows {
                assert!(window.tokens <= budget || window.turns.len() == 1);
                let recount: usize = window.turns.iter().map(|t| words(&t.formatted())).sum();
                assert_eq!(window.tokens, recount);
            }
            let flattened = concat(&windows);
            assert_eq!(flattened, turns.iter().collect::<Vec<_>>());
        }
    }

    #[test]
    fn building_is_deterministic() {
        let turns = vec![turn_with_words("A", 3), turn_with_words("B", 8)];
        assert_eq!(
            build_windows(&turns, 6, &words),
            build_windows(&turns, 6, &words)
        );
    }

    #[test]
    fn text_joins_formatted_lines() {
        let turns = vec![Turn::new("host", "hello"), Turn::new("guest", "hi")];
        let windows = build_windows(&turns, 100, &words);
        assert_eq!(windows[0].text(), "host: hello\nguest: hi");
    }
}
