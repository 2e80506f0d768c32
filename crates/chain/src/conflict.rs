//! Conflict detection between two revisions of a note's text.
//!
//! Two strategies run independently and their records are aggregated:
//!
//! - **Heuristic** — sentence-pair comparison that never calls out. A
//!   negation flip on a shared subject ("is alive" vs "is not alive") is a
//!   high-confidence conflict (≥0.6); a diverging attribute on a shared
//!   subject ("blue eyes" vs "green eyes") is a lower-confidence one (<0.6).
//!   This strategy always runs.
//! - **Llm-flavored** — matches explicit contradiction language and, when a
//!   `TextGenerator` is wired in, asks it to confirm. Generator failures
//!   degrade to fewer detected conflicts; they never abort the caller's
//!   write.

use std::sync::Arc;

use scriptorium_core::bedside::{ConflictRecord, ConflictStrategy};
use scriptorium_core::llm::TextGenerator;
use tracing::{debug, warn};

const NEGATION_FLIP_CONFIDENCE: f32 = 0.75;
const DIVERGENCE_CONFIDENCE: f32 = 0.5;
const PATTERN_CONFIDENCE: f32 = 0.6;

/// Linking verbs that split a sentence into subject and predicate.
const LINKING_VERBS: &[&str] = &[
    "is", "are", "was", "were", "has", "have", "had", "will", "can", "cannot", "does", "do", "did",
];

const NEGATION_TOKENS: &[&str] = &["not", "never", "no"];

/// Phrases signalling that a text itself asserts a contradiction.
const CONTRADICTION_MARKERS: &[&str] = &["contradicts", "conflicts with"];

/// Detects contradictions between a previous and a current text body.
#[derive(Clone, Default)]
pub struct ConflictDetector {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl ConflictDetector {
    /// Heuristic-only detector.
    pub fn new() -> Self {
        Self { generator: None }
    }

    /// Detector that additionally consults an external generator, fail-soft.
    pub fn with_generator(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Compare two text bodies and report candidate contradictions.
    ///
    /// Never errors and never returns records for identical claims; an empty
    /// list means "no conflict found", not "no conflict exists".
    pub async fn detect_conflicts(&self, previous: &str, current: &str) -> Vec<ConflictRecord> {
        let mut records = heuristic_conflicts(previous, current);
        records.extend(pattern_conflicts(previous, current));

        if let Some(generator) = &self.generator {
            match self.probe_generator(generator.as_ref(), previous, current).await {
                Ok(mut extra) => records.append(&mut extra),
                Err(e) => {
                    // Reduced recall, not a failure: the heuristic records stand.
                    warn!(error = %e, "LLM conflict probe failed; continuing with heuristics");
                }
            }
        }

        debug!(count = records.len(), "Conflict detection complete");
        records
    }

    async fn probe_generator(
        &self,
        generator: &dyn TextGenerator,
        previous: &str,
        current: &str,
    ) -> Result<Vec<ConflictRecord>, scriptorium_core::error::GenerateError> {
        let prompt = format!(
            "Compare the two note revisions below. If the CURRENT revision \
             contradicts the PREVIOUS one, answer with one line per \
             contradiction in the form `CONFLICT: <previous claim> | \
             <current claim>`. Answer `NONE` if there is no contradiction.\n\n\
             PREVIOUS:\n{previous}\n\nCURRENT:\n{current}"
        );
        let response = generator.generate(&prompt).await?;

        let mut records = Vec::new();
        for line in response.lines() {
            let Some(rest) = line.trim().strip_prefix("CONFLICT:") else {
                continue;
            };
            let mut parts = rest.splitn(2, '|');
            let prev_claim = parts.next().unwrap_or("").trim();
            let cur_claim = parts.next().unwrap_or("").trim();
            if prev_claim.is_empty() || cur_claim.is_empty() {
                continue;
            }
            records.push(ConflictRecord {
                previous: prev_claim.to_string(),
                current: cur_claim.to_string(),
                strategy: ConflictStrategy::Llm,
                confidence: PATTERN_CONFIDENCE,
                resolution: None,
            });
        }
        Ok(records)
    }
}

/// Split a text into trimmed, non-empty sentences.
fn sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A sentence broken at its first linking verb.
struct Clause {
    subject: String,
    verb: String,
    /// Predicate tokens, lowercased, punctuation stripped.
    predicate: Vec<String>,
    negated: bool,
    original: String,
}

fn parse_clause(sentence: &str) -> Option<Clause> {
    // Normalize contractions so "isn't alive" reads as "is not alive".
    let normalized = sentence.to_lowercase().replace("n't", " not");
    let words: Vec<String> = normalized
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || *c == '\'')
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect();

    let verb_index = words
        .iter()
        .position(|w| LINKING_VERBS.contains(&w.as_str()))?;
    if verb_index == 0 || verb_index + 1 >= words.len() {
        return None;
    }

    let predicate_raw = &words[verb_index + 1..];
    let negated = predicate_raw
        .iter()
        .any(|w| NEGATION_TOKENS.contains(&w.as_str()));
    let predicate: Vec<String> = predicate_raw
        .iter()
        .filter(|w| !NEGATION_TOKENS.contains(&w.as_str()))
        .cloned()
        .collect();

    Some(Clause {
        subject: words[..verb_index].join(" "),
        verb: words[verb_index].clone(),
        predicate,
        negated,
        original: sentence.trim().to_string(),
    })
}

/// Sentence-pair heuristic: negation flips and attribute divergence on a
/// shared subject.
fn heuristic_conflicts(previous: &str, current: &str) -> Vec<ConflictRecord> {
    let prev_clauses: Vec<Clause> = sentences(previous)
        .iter()
        .filter_map(|s| parse_clause(s))
        .collect();
    let cur_clauses: Vec<Clause> = sentences(current)
        .iter()
        .filter_map(|s| parse_clause(s))
        .collect();

    let mut records = Vec::new();
    for prev in &prev_clauses {
        for cur in &cur_clauses {
            if prev.subject != cur.subject || prev.verb != cur.verb {
                continue;
            }

            // Negation flip: same claim, opposite polarity.
            if prev.negated != cur.negated && prev.predicate == cur.predicate {
                records.push(ConflictRecord {
                    previous: prev.original.clone(),
                    current: cur.original.clone(),
                    strategy: ConflictStrategy::Heuristic,
                    confidence: NEGATION_FLIP_CONFIDENCE,
                    resolution: None,
                });
                continue;
            }

            // Attribute divergence: same subject and verb, predicates that
            // share a content word but differ ("blue eyes" vs "green eyes").
            if prev.negated == cur.negated
                && prev.predicate != cur.predicate
                && shares_content_word(&prev.predicate, &cur.predicate)
            {
                records.push(ConflictRecord {
                    previous: prev.original.clone(),
                    current: cur.original.clone(),
                    strategy: ConflictStrategy::Heuristic,
                    confidence: DIVERGENCE_CONFIDENCE,
                    resolution: None,
                });
            }
        }
    }
    records
}

fn shares_content_word(a: &[String], b: &[String]) -> bool {
    a.iter()
        .any(|w| w.chars().count() >= 3 && b.contains(w))
}

/// Explicit contradiction language in either text.
fn pattern_conflicts(previous: &str, current: &str) -> Vec<ConflictRecord> {
    let mut records = Vec::new();
    for marker in CONTRADICTION_MARKERS {
        let hit = sentences(current)
            .into_iter()
            .find(|s| s.to_lowercase().contains(marker))
            .or_else(|| {
                sentences(previous)
                    .into_iter()
                    .find(|s| s.to_lowercase().contains(marker))
            });
        if let Some(sentence) = hit {
            records.push(ConflictRecord {
                previous: sentences(previous).first().cloned().unwrap_or_default(),
                current: sentence,
                strategy: ConflictStrategy::Llm,
                confidence: PATTERN_CONFIDENCE,
                resolution: None,
            });
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scriptorium_core::error::GenerateError;

    #[tokio::test]
    async fn negation_flip_detected() {
        let detector = ConflictDetector::new();
        let records = detector
            .detect_conflicts("Alice is alive.", "Alice is not alive.")
            .await;
        assert!(!records.is_empty());
        let record = &records[0];
        assert_eq!(record.strategy, ConflictStrategy::Heuristic);
        assert!(record.confidence >= 0.6);
        assert!(record.previous.contains("alive"));
        assert!(record.current.contains("not alive"));
    }

    #[tokio::test]
    async fn identical_claims_do_not_conflict() {
        let detector = ConflictDetector::new();
        let records = detector
            .detect_conflicts("Alice is alive.", "Alice is alive.")
            .await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn contraction_counts_as_negation() {
        let detector = ConflictDetector::new();
        let records = detector
            .detect_conflicts("The bridge is passable.", "The bridge isn't passable.")
            .await;
        assert!(!records.is_empty());
        assert!(records[0].confidence >= 0.6);
    }

    #[tokio::test]
    async fn attribute_divergence_is_lower_confidence() {
        let detector = ConflictDetector::new();
        let records = detector
            .detect_conflicts("Seth has blue eyes.", "Seth has green eyes.")
            .await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].strategy, ConflictStrategy::Heuristic);
        assert!(records[0].confidence < 0.6);
    }

    #[tokio::test]
    async fn unrelated_subjects_do_not_conflict() {
        let detector = ConflictDetector::new();
        let records = detector
            .detect_conflicts("Seth has blue eyes.", "Mira has green eyes.")
            .await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn disjoint_predicates_do_not_conflict() {
        let detector = ConflictDetector::new();
        // Same subject, but no shared content word between predicates.
        let records = detector
            .detect_conflicts("Alice is tired.", "Alice is hungry.")
            .await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn explicit_contradiction_language_flagged_as_llm() {
        let detector = ConflictDetector::new();
        let records = detector
            .detect_conflicts(
                "The heir survived the fire.",
                "This contradicts the earlier account of the fire.",
            )
            .await;
        assert!(records
            .iter()
            .any(|r| r.strategy == ConflictStrategy::Llm
                && (r.confidence - 0.6).abs() < f32::EPSILON));
    }

    #[tokio::test]
    async fn multi_sentence_texts_scan_all_pairs() {
        let detector = ConflictDetector::new();
        let records = detector
            .detect_conflicts(
                "The journey takes three days. Seth is wounded.",
                "The city gates are sealed. Seth is not wounded.",
            )
            .await;
        assert_eq!(records.len(), 1);
        assert!(records[0].previous.contains("wounded"));
    }

    struct ScriptedGenerator(String);

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
            Ok(self.0.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
            Err(GenerateError::RequestFailed("boom".into()))
        }
    }

    #[tokio::test]
    async fn generator_records_are_aggregated() {
        let detector = ConflictDetector::with_generator(Arc::new(ScriptedGenerator(
            "CONFLICT: the map was lost | the map hangs in the study".into(),
        )));
        let records = detector
            .detect_conflicts("The map was lost at sea.", "The map hangs in the study.")
            .await;
        assert!(records
            .iter()
            .any(|r| r.strategy == ConflictStrategy::Llm && r.previous.contains("lost")));
    }

    #[tokio::test]
    async fn generator_failure_degrades_gracefully() {
        let detector = ConflictDetector::with_generator(Arc::new(FailingGenerator));
        let records = detector
            .detect_conflicts("Alice is alive.", "Alice is not alive.")
            .await;
        // Heuristic record survives the generator failure.
        assert!(!records.is_empty());
        assert_eq!(records[0].strategy, ConflictStrategy::Heuristic);
    }
}
