//! Response convergence detection for the polling loop.
//!
//! The page offers no completion signal, so the detector infers one: a
//! non-empty response text that stays identical across consecutive polls
//! while nothing is generating has converged. Any change, or an active
//! generation indicator, re-baselines the counter. The caller owns the
//! overall deadline and may fall back to the best text seen so far.

use std::sync::OnceLock;

use regex::Regex;

/// Consecutive stable polls required before a response counts as done.
pub const DEFAULT_STABILITY_THRESHOLD: u32 = 3;

/// Lowercased page-text fragments that mean the account is throttled.
const RATE_LIMIT_PHRASES: [&str; 2] = ["rate limit", "too many requests"];
/// Lowercased page-text fragment for a generic upstream failure banner.
const FAILURE_PHRASE: &str = "something went wrong";

fn thinking_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:Thought|Thinking|Reason(?:ed)?)\s+(?:for\s+)?(\d+)\s*(?:second|sec|s)")
            .unwrap_or_else(|_| unreachable!("static pattern is valid"))
    })
}

fn chrome_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^(Copy|Share|Like|Dislike|Read aloud|ChatGPT|Ask anything|Extended|Memory|\d+\s*/\s*\d+|Pro thinking|Done|DEVELOPER|Thought for)",
        )
        .unwrap_or_else(|_| unreachable!("static pattern is valid"))
    })
}

/// Drop page-chrome lines (action buttons, composer placeholder, thinking
/// banners) from an extracted response.
#[must_use]
pub fn strip_chrome(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !chrome_pattern().is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Verdict for one poll observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Done {
        text: String,
        thinking_seconds: Option<u64>,
    },
    RateLimited,
    UpstreamError,
}

/// Stateful convergence detector, one per send.
#[derive(Debug)]
pub struct ConvergenceDetector {
    threshold: u32,
    last_text: String,
    stable_count: u32,
    thinking_seconds: Option<u64>,
}

impl ConvergenceDetector {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            last_text: String::new(),
            stable_count: 0,
            thinking_seconds: None,
        }
    }

    /// Fold one observation into the detector.
    ///
    /// `page_text` is the whole visible page (drives failure phrases and
    /// the thinking banner); `response_text` is the extracted candidate
    /// response; `is_generating` reflects the stop-button indicator.
    pub fn tick(&mut self, page_text: &str, response_text: &str, is_generating: bool) -> Tick {
        let lowered = page_text.to_lowercase();
        if RATE_LIMIT_PHRASES
            .iter()
            .any(|phrase| lowered.contains(phrase))
        {
            return Tick::RateLimited;
        }
        if lowered.contains(FAILURE_PHRASE) {
            return Tick::UpstreamError;
        }

        // Thinking time only ever grows; the banner restates the running
        // total on every poll.
        if let Some(captures) = thinking_pattern().captures(page_text) {
            if let Some(seconds) = captures.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) {
                self.thinking_seconds = Some(self.thinking_seconds.unwrap_or(0).max(seconds));
            }
        }

        if response_text.is_empty() {
            return Tick::Continue;
        }

        if is_generating {
            // Never converge while the stop button is visible.
            self.stable_count = 0;
            self.last_text = response_text.to_string();
            return Tick::Continue;
        }

        if response_text == self.last_text {
            self.stable_count += 1;
            if self.stable_count >= self.threshold {
                return Tick::Done {
                    text: self.last_text.clone(),
                    thinking_seconds: self.thinking_seconds,
                };
            }
        } else {
            self.stable_count = 0;
            self.last_text = response_text.to_string();
        }

        Tick::Continue
    }

    /// Best response text observed so far; the deadline fallback.
    #[must_use]
    pub fn best_text(&self) -> &str {
        &self.last_text
    }

    #[must_use]
    pub fn thinking_seconds(&self) -> Option<u64> {
        self.thinking_seconds
    }
}

impl Default for ConvergenceDetector {
    fn default() -> Self {
        Self::new(DEFAULT_STABILITY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::{strip_chrome, ConvergenceDetector, Tick};

    #[test]
    fn stable_text_converges_at_the_threshold() {
        let mut detector = ConvergenceDetector::new(3);

        assert_eq!(detector.tick("", "", true), Tick::Continue);
        // First sight of the text baselines; three stable repeats converge.
        assert_eq!(detector.tick("page", "Hello", false), Tick::Continue);
        assert_eq!(detector.tick("page", "Hello", false), Tick::Continue);
        assert_eq!(detector.tick("page", "Hello", false), Tick::Continue);
        assert_eq!(
            detector.tick("page", "Hello", false),
            Tick::Done {
                text: "Hello".to_string(),
                thinking_seconds: None,
            }
        );
    }

    #[test]
    fn changing_text_resets_the_counter() {
        let mut detector = ConvergenceDetector::new(2);
        assert_eq!(detector.tick("p", "Hel", false), Tick::Continue);
        assert_eq!(detector.tick("p", "Hel", false), Tick::Continue);
        assert_eq!(detector.tick("p", "Hello", false), Tick::Continue);
        assert_eq!(detector.tick("p", "Hello", false), Tick::Continue);
        assert!(matches!(
            detector.tick("p", "Hello", false),
            Tick::Done { .. }
        ));
    }

    #[test]
    fn never_done_while_generating() {
        let mut detector = ConvergenceDetector::new(1);
        for _ in 0..10 {
            assert_eq!(detector.tick("p", "stable text", true), Tick::Continue);
        }
        // One poll after generation stops is enough at threshold 1.
        assert!(matches!(
            detector.tick("p", "stable text", false),
            Tick::Done { .. }
        ));
    }

    #[test]
    fn rate_limit_phrase_wins_over_stable_text() {
        let mut detector = ConvergenceDetector::new(1);
        assert_eq!(detector.tick("p", "answer", false), Tick::Continue);
        assert_eq!(
            detector.tick("You have hit your Rate Limit.", "answer", false),
            Tick::RateLimited
        );
        assert_eq!(
            detector.tick("too many requests, slow down", "answer", false),
            Tick::RateLimited
        );
    }

    #[test]
    fn failure_phrase_is_an_upstream_error() {
        let mut detector = ConvergenceDetector::new(1);
        assert_eq!(
            detector.tick("Something went wrong. Try again.", "", false),
            Tick::UpstreamError
        );
    }

    #[test]
    fn thinking_time_grows_monotonically() {
        let mut detector = ConvergenceDetector::new(5);
        detector.tick("Thinking for 3 seconds", "", true);
        assert_eq!(detector.thinking_seconds(), Some(3));
        detector.tick("Thought for 41 seconds", "x", false);
        assert_eq!(detector.thinking_seconds(), Some(41));
        // A stale banner never shrinks the running total.
        detector.tick("Thought for 12 seconds", "x", false);
        assert_eq!(detector.thinking_seconds(), Some(41));
    }

    #[test]
    fn reasoned_variant_matches_the_banner() {
        let mut detector = ConvergenceDetector::new(5);
        detector.tick("Reasoned for 7 seconds", "", true);
        assert_eq!(detector.thinking_seconds(), Some(7));
    }

    #[test]
    fn done_carries_the_thinking_time() {
        let mut detector = ConvergenceDetector::new(1);
        detector.tick("Thought for 9 seconds", "4", false);
        assert_eq!(
            detector.tick("Thought for 9 seconds", "4", false),
            Tick::Done {
                text: "4".to_string(),
                thinking_seconds: Some(9),
            }
        );
    }

    #[test]
    fn best_text_tracks_the_latest_observation() {
        let mut detector = ConvergenceDetector::new(10);
        detector.tick("p", "partial ans", true);
        assert_eq!(detector.best_text(), "partial ans");
    }

    #[test]
    fn empty_response_text_never_counts_as_stable() {
        let mut detector = ConvergenceDetector::new(1);
        for _ in 0..5 {
            assert_eq!(detector.tick("p", "", false), Tick::Continue);
        }
    }

    #[test]
    fn chrome_lines_are_stripped() {
        let cleaned = strip_chrome("The answer is 4.\nCopy\nShare\nLike\nDislike\nRead aloud");
        assert_eq!(cleaned, "The answer is 4.");
    }

    #[test]
    fn chrome_stripping_keeps_multi_line_prose() {
        let cleaned = strip_chrome("First paragraph.\n\nSecond paragraph.\nThought for 9 seconds");
        assert_eq!(cleaned, "First paragraph.\nSecond paragraph.");
    }
}
