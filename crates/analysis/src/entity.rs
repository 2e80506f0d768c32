//! Structural parsing and entity extraction over manuscript text.
//!
//! Deliberately lightweight: proper-noun heuristics over tokenized text,
//! not NLP. The novelty and relevance layers downstream only need candidate
//! names with mention counts.

use serde::{Deserialize, Serialize};

/// A named entity candidate found in a text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityNode {
    pub name: String,
    pub mention_count: usize,
}

/// All entities of one text, insertion-ordered by first mention.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityGraph {
    pub nodes: Vec<EntityNode>,
}

impl EntityGraph {
    pub fn names(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.name.clone()).collect()
    }

    pub fn node(&self, name: &str) -> Option<&EntityNode> {
        let needle = name.trim().to_lowercase();
        self.nodes.iter().find(|n| n.name.to_lowercase() == needle)
    }
}

/// Paragraph/sentence/word breakdown of a text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralParse {
    /// Blank-line-separated paragraphs, trimmed, empty ones dropped.
    pub paragraphs: Vec<String>,
    pub sentence_count: usize,
    pub word_count: usize,
}

/// Split a text into its structural parts.
pub fn parse_structure(text: &str) -> StructuralParse {
    let paragraphs: Vec<String> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    let sentence_count = text
        .split(['.', '!', '?'])
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .count();
    let word_count = text.split_whitespace().count();

    StructuralParse {
        paragraphs,
        sentence_count,
        word_count,
    }
}

/// Extract proper-noun entity candidates with mention counts.
///
/// A candidate is a capitalized word that also appears somewhere other than
/// sentence-initial position (a word only ever capitalized at sentence
/// starts is treated as ordinary prose).
pub fn extract_entities(text: &str) -> Vec<EntityNode> {
    let mut counts: Vec<(String, usize, bool)> = Vec::new();

    let mut sentence_start = true;
    for raw in text.split_whitespace() {
        let word: String = raw
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_string();
        let ends_sentence = raw.ends_with(['.', '!', '?']);
        if word.is_empty() {
            sentence_start = sentence_start || ends_sentence;
            continue;
        }

        let capitalized = word.chars().next().is_some_and(char::is_uppercase)
            && word.chars().skip(1).all(char::is_alphabetic)
            && word.len() > 1;
        if capitalized {
            let mid_sentence = !sentence_start;
            match counts.iter_mut().find(|(name, _, _)| *name == word) {
                Some((_, count, seen_mid)) => {
                    *count += 1;
                    *seen_mid = *seen_mid || mid_sentence;
                }
                None => counts.push((word, 1, mid_sentence)),
            }
        }

        sentence_start = ends_sentence;
    }

    counts
        .into_iter()
        .filter(|(_, _, seen_mid)| *seen_mid)
        .map(|(name, mention_count, _)| EntityNode {
            name,
            mention_count,
        })
        .collect()
}

/// Entity candidates assembled into a graph.
pub fn build_entity_graph(text: &str) -> EntityGraph {
    EntityGraph {
        nodes: extract_entities(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_splits_paragraphs_and_counts() {
        let parse = parse_structure("One two three.\n\nFour five. Six seven!\n\n");
        assert_eq!(parse.paragraphs.len(), 2);
        assert_eq!(parse.sentence_count, 3);
        assert_eq!(parse.word_count, 7);
    }

    #[test]
    fn empty_text_parses_empty() {
        let parse = parse_structure("");
        assert!(parse.paragraphs.is_empty());
        assert_eq!(parse.sentence_count, 0);
        assert_eq!(parse.word_count, 0);
    }

    #[test]
    fn entities_require_mid_sentence_capitalization() {
        let entities = extract_entities("The storm broke. Seth ran to Mira. Then Seth fell.");
        // "The" and "Then" only ever start sentences; Seth appears
        // mid-sentence once, Mira mid-sentence once.
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Seth", "Mira"]);

        let seth = entities.iter().find(|e| e.name == "Seth").unwrap();
        assert_eq!(seth.mention_count, 2);
    }

    #[test]
    fn graph_lookup_is_case_insensitive() {
        let graph = build_entity_graph("She saw Seth by the river, and Seth waved.");
        assert!(graph.node("seth").is_some());
        assert!(graph.node("  SETH ").is_some());
        assert!(graph.node("mira").is_none());
        assert_eq!(graph.names(), vec!["Seth"]);
    }
}
