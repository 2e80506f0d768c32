//! Style fingerprinting and weighted profile merging.

use serde::{Deserialize, Serialize};

/// Aggregate style metrics for a span of text. `line_count` doubles as the
/// merge weight, so a profile built from nine lines pulls nine times harder
/// than one built from a single line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    /// Non-empty lines measured. Weight for merging.
    pub line_count: usize,
    pub words_per_sentence: f32,
    pub avg_word_length: f32,
    /// Fraction of lines containing quoted dialogue.
    pub dialogue_ratio: f32,
}

impl StyleProfile {
    /// Merge an incoming profile into this one, weighting every metric by
    /// line counts. A zero combined weight cannot be averaged, so the
    /// incoming profile wins outright.
    pub fn merge(&self, incoming: &StyleProfile) -> StyleProfile {
        let w_self = self.line_count as f32;
        let w_inc = incoming.line_count as f32;
        let total = w_self + w_inc;
        if total <= 0.0 {
            return incoming.clone();
        }

        let blend = |a: f32, b: f32| (a * w_self + b * w_inc) / total;
        StyleProfile {
            line_count: self.line_count + incoming.line_count,
            words_per_sentence: blend(self.words_per_sentence, incoming.words_per_sentence),
            avg_word_length: blend(self.avg_word_length, incoming.avg_word_length),
            dialogue_ratio: blend(self.dialogue_ratio, incoming.dialogue_ratio),
        }
    }
}

/// Fingerprint a span of text.
pub fn analyze_style(text: &str) -> StyleProfile {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let words: Vec<&str> = text.split_whitespace().collect();
    let sentence_count = text
        .split(['.', '!', '?'])
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .count();

    let words_per_sentence = if sentence_count > 0 {
        words.len() as f32 / sentence_count as f32
    } else {
        0.0
    };
    let avg_word_length = if words.is_empty() {
        0.0
    } else {
        let total: usize = words
            .iter()
            .map(|w| w.chars().filter(|c| c.is_alphanumeric()).count())
            .sum();
        total as f32 / words.len() as f32
    };
    let dialogue_ratio = if lines.is_empty() {
        0.0
    } else {
        let quoted = lines.iter().filter(|l| l.contains('"')).count();
        quoted as f32 / lines.len() as f32
    };

    StyleProfile {
        line_count: lines.len(),
        words_per_sentence,
        avg_word_length,
        dialogue_ratio,
    }
}
