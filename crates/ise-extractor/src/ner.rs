//! Dictionary-based entity tagging
//!
//! [`GazetteerTagger`] tags a sentence by matching known surface forms
//! (terms and their aliases) against its tokens. Matching is
//! case-insensitive and greedy: at each position the longest known term
//! wins, and matches never overlap.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::text::tokenize;
use ise_core::{EntityMention, EntityTagger, EntityType, IseError, Result, Sentence};

/// Dictionary entry for entity matching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub term: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Entity tagger backed by a dictionary of known names
#[derive(Debug, Clone, Default)]
pub struct GazetteerTagger {
    /// Lookup index (lowercased, space-joined tokens -> entity type)
    lookup: HashMap<String, EntityType>,
    /// Longest term length in tokens
    max_len: usize,
}

impl GazetteerTagger {
    /// Create an empty tagger
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tagger from dictionary entries
    pub fn from_entries(entries: impl IntoIterator<Item = DictionaryEntry>) -> Self {
        let mut tagger = Self::new();
        for entry in entries {
            tagger.add_entry(&entry);
        }
        tagger
    }

    /// Load dictionary entries from a JSON array file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            IseError::ConfigError(format!("failed to read gazetteer {}: {e}", path.display()))
        })?;
        let entries: Vec<DictionaryEntry> = serde_json::from_str(&content).map_err(|e| {
            IseError::ConfigError(format!("failed to parse gazetteer {}: {e}", path.display()))
        })?;
        Ok(Self::from_entries(entries))
    }

    /// Add a dictionary term
    pub fn add_term(&mut self, term: &str, entity_type: EntityType, aliases: Vec<&str>) {
        self.add_entry(&DictionaryEntry {
            term: term.to_string(),
            entity_type,
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
        });
    }

    fn add_entry(&mut self, entry: &DictionaryEntry) {
        for surface in std::iter::once(&entry.term).chain(&entry.aliases) {
            let tokens = tokenize(surface);
            if tokens.is_empty() {
                continue;
            }
            self.max_len = self.max_len.max(tokens.len());
            let key = Self::key(tokens.iter().map(|t| t.text.as_str()));
            self.lookup.insert(key, entry.entity_type);
        }
    }

    /// Number of known surface forms
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    fn key<'a>(tokens: impl Iterator<Item = &'a str>) -> String {
        tokens
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Greedy longest-match tagging over the sentence tokens
    fn find_mentions(&self, sentence: &Sentence) -> Vec<EntityMention> {
        let tokens = &sentence.tokens;
        let mut mentions = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            let longest = self.max_len.min(tokens.len() - i);
            let found = (1..=longest).rev().find_map(|len| {
                let key = Self::key(tokens[i..i + len].iter().map(|t| t.text.as_str()));
                self.lookup.get(&key).map(|entity_type| (len, *entity_type))
            });

            match found {
                Some((len, entity_type)) => {
                    let text = &sentence.text[tokens[i].start..tokens[i + len - 1].end];
                    mentions.push(EntityMention::new(text, entity_type, i, i + len));
                    i += len;
                }
                None => i += 1,
            }
        }

        mentions
    }
}

#[async_trait::async_trait]
impl EntityTagger for GazetteerTagger {
    async fn tag(&self, sentence: &Sentence) -> Result<Vec<EntityMention>> {
        let mentions = self.find_mentions(sentence);
        debug!(count = mentions.len(), "gazetteer tagged sentence");
        Ok(mentions)
    }

    fn name(&self) -> &str {
        "gazetteer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::RuleSegmenter;
    use ise_core::SentenceSegmenter;

    fn sentence(text: &str) -> Sentence {
        RuleSegmenter::new().segment(text).unwrap().remove(0)
    }

    fn tagger() -> GazetteerTagger {
        let mut tagger = GazetteerTagger::new();
        tagger.add_term("Jeff Bezos", EntityType::Person, vec!["Bezos"]);
        tagger.add_term("Amazon", EntityType::Organization, vec!["Amazon.com"]);
        tagger.add_term("Princeton", EntityType::City, vec![]);
        tagger.add_term("Princeton University", EntityType::Organization, vec![]);
        tagger
    }

    #[tokio::test]
    async fn test_longest_match_wins() {
        let s = sentence("Jeff Bezos founded Amazon, but previously worked at Princeton University.");
        let mentions = tagger().tag(&s).await.unwrap();

        let found: Vec<(&str, EntityType)> = mentions
            .iter()
            .map(|m| (m.text.as_str(), m.entity_type))
            .collect();
        assert_eq!(
            found,
            vec![
                ("Jeff Bezos", EntityType::Person),
                ("Amazon", EntityType::Organization),
                ("Princeton University", EntityType::Organization),
            ]
        );
        assert_eq!((mentions[0].start, mentions[0].end), (0, 2));
    }

    #[tokio::test]
    async fn test_case_insensitive_alias() {
        let s = sentence("BEZOS sold shares of amazon.com last year.");
        let mentions = tagger().tag(&s).await.unwrap();
        assert_eq!(mentions.len(), 2);
        assert_eq!(mentions[0].text, "BEZOS");
        assert_eq!(mentions[1].text, "amazon.com");
        assert_eq!(mentions[1].entity_type, EntityType::Organization);
    }

    #[tokio::test]
    async fn test_no_matches() {
        let s = sentence("Nothing to see here.");
        assert!(tagger().tag(&s).await.unwrap().is_empty());
    }

    #[test]
    fn test_entries_from_json() {
        let entries: Vec<DictionaryEntry> = serde_json::from_str(
            r#"[
                {"term": "OpenAI", "type": "ORGANIZATION"},
                {"term": "Alec Radford", "type": "PERSON", "aliases": ["Radford"]}
            ]"#,
        )
        .unwrap();
        let tagger = GazetteerTagger::from_entries(entries);
        assert_eq!(tagger.len(), 3);
        assert_eq!(tagger.name(), "gazetteer");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = GazetteerTagger::from_file("/nonexistent/gazetteer.json").unwrap_err();
        assert!(matches!(err, IseError::ConfigError(_)));
    }
}
