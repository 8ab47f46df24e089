//! Sentence-boundary chunking of streamed assistant text.
//!
//! The engine emits text in small deltas; synthesis wants whole sentences.
//! What counts as "end of sentence" is inherently approximate (abbreviations,
//! decimals, ellipses), so the boundary decision is a pluggable policy
//! rather than a hardcoded punctuation check.

use once_cell::sync::Lazy;
use regex::Regex;

/// Decides where a buffered text stream can be cut into a speakable chunk.
pub trait BoundaryPolicy: Send + Sync {
    /// Byte index one past the end of the first complete sentence in
    /// `text`, or `None` if no complete sentence is buffered yet.
    fn next_boundary(&self, text: &str) -> Option<usize>;
}

/// Candidate boundaries: terminal punctuation, optional closing quote or
/// paren, followed by whitespace. End-of-buffer is handled separately since
/// a delta may end mid-sentence.
static BOUNDARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?]["')\]]*\s"#).expect("boundary regex is valid"));

/// Common abbreviations whose trailing period does not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "Mr.", "Mrs.", "Ms.", "Dr.", "Prof.", "Sr.", "Jr.", "St.", "Inc.", "Ltd.", "Corp.", "vs.",
    "etc.", "e.g.", "i.e.",
];

/// Default policy: terminal `.?!`, with guards for common abbreviations and
/// decimal numbers.
#[derive(Debug, Default, Clone, Copy)]
pub struct PunctuationBoundary;

impl PunctuationBoundary {
    fn is_guarded(text: &str, punct_idx: usize) -> bool {
        let byte = text.as_bytes()[punct_idx];

        if byte == b'.' {
            // Decimal number: digit on both sides of the period.
            let prev_is_digit = punct_idx > 0
                && text.as_bytes()[punct_idx - 1].is_ascii_digit();
            let next_is_digit = text
                .as_bytes()
                .get(punct_idx + 1)
                .is_some_and(|b| b.is_ascii_digit());
            if prev_is_digit && next_is_digit {
                return true;
            }

            // Known abbreviation ending exactly at this period.
            let head = &text[..=punct_idx];
            if ABBREVIATIONS.iter().any(|abbr| {
                head.ends_with(abbr)
                    && head[..head.len() - abbr.len()]
                        .chars()
                        .next_back()
                        .is_none_or(|c| c.is_whitespace())
            }) {
                return true;
            }
        }

        false
    }
}

impl BoundaryPolicy for PunctuationBoundary {
    fn next_boundary(&self, text: &str) -> Option<usize> {
        for m in BOUNDARY_RE.find_iter(text) {
            if !Self::is_guarded(text, m.start()) {
                // Cut after the punctuation run, before the whitespace that
                // matched; the whitespace stays with the remainder.
                return Some(m.end() - 1);
            }
        }
        None
    }
}

/// Accumulates streamed text deltas and emits complete sentences.
pub struct SentenceChunker {
    policy: Box<dyn BoundaryPolicy>,
    buffer: String,
}

impl SentenceChunker {
    pub fn new(policy: Box<dyn BoundaryPolicy>) -> Self {
        Self {
            policy,
            buffer: String::new(),
        }
    }

    /// Append a delta and drain every complete sentence it unlocked.
    pub fn push(&mut self, delta: &str) -> Vec<String> {
        self.buffer.push_str(delta);

        let mut sentences = Vec::new();
        while let Some(end) = self.policy.next_boundary(&self.buffer) {
            let rest = self.buffer.split_off(end);
            let sentence = std::mem::replace(&mut self.buffer, rest);
            let trimmed = sentence.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            self.buffer = self.buffer.trim_start().to_string();
        }
        sentences
    }

    /// Drain whatever is buffered, complete sentence or not. Used at turn
    /// completion so trailing text without terminal punctuation still gets
    /// spoken and logged.
    pub fn flush(&mut self) -> Option<String> {
        let text = std::mem::take(&mut self.buffer);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Discard buffered partial text without emitting it. Used on session
    /// teardown.
    pub fn discard(&mut self) -> usize {
        let len = self.buffer.len();
        self.buffer.clear();
        len
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new(Box::new(PunctuationBoundary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sentence_emitted_on_boundary() {
        let mut chunker = SentenceChunker::default();
        assert!(chunker.push("Hello there").is_empty());
        let out = chunker.push(". How are you?");
        assert_eq!(out, vec!["Hello there."]);
    }

    #[test]
    fn test_question_needs_following_whitespace() {
        let mut chunker = SentenceChunker::default();
        // The boundary is only confirmed once something follows the
        // punctuation; a delta could continue with a closing quote.
        assert!(chunker.push("Really?").is_empty());
        let out = chunker.push(" Yes.");
        assert_eq!(out, vec!["Really?"]);
    }

    #[test]
    fn test_multiple_sentences_in_one_delta() {
        let mut chunker = SentenceChunker::default();
        let out = chunker.push("One. Two! Three? Four");
        assert_eq!(out, vec!["One.", "Two!", "Three?"]);
        assert_eq!(chunker.flush(), Some("Four".to_string()));
    }

    #[test]
    fn test_abbreviation_not_a_boundary() {
        let mut chunker = SentenceChunker::default();
        let out = chunker.push("I spoke with Dr. Patel yesterday. She agreed.");
        assert_eq!(out, vec!["I spoke with Dr. Patel yesterday."]);
    }

    #[test]
    fn test_decimal_not_a_boundary() {
        let mut chunker = SentenceChunker::default();
        let out = chunker.push("The plan costs 42.50 per month. Interested?");
        assert_eq!(out, vec!["The plan costs 42.50 per month."]);
    }

    #[test]
    fn test_closing_quote_stays_with_sentence() {
        let mut chunker = SentenceChunker::default();
        let out = chunker.push("He said \"sure.\" Then hung up.");
        assert_eq!(out[0], "He said \"sure.\"");
    }

    #[test]
    fn test_flush_empty_is_none() {
        let mut chunker = SentenceChunker::default();
        assert_eq!(chunker.flush(), None);
        chunker.push("   ");
        assert_eq!(chunker.flush(), None);
    }

    #[test]
    fn test_discard_drops_partial_text() {
        let mut chunker = SentenceChunker::default();
        chunker.push("half a sent");
        assert!(chunker.discard() > 0);
        assert_eq!(chunker.flush(), None);
    }

    #[test]
    fn test_custom_policy_is_pluggable() {
        struct NewlineBoundary;
        impl BoundaryPolicy for NewlineBoundary {
            fn next_boundary(&self, text: &str) -> Option<usize> {
                text.find('\n').map(|i| i + 1)
            }
        }

        let mut chunker = SentenceChunker::new(Box::new(NewlineBoundary));
        let out = chunker.push("line one\nline two");
        assert_eq!(out, vec!["line one"]);
    }
}
