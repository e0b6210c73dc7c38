//! Sentence segmentation and tokenization
//!
//! Sentences are split with SRX rules: the bundled English rules end a
//! sentence at `.`, `!` or `?` followed by a word that does not start in
//! lowercase, keep titles and initials attached to the following name, and
//! always break at a blank line. Tokens come from a single regex.

use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use srx::{Rules, SRX};

use ise_core::{IseError, Result, Sentence, SentenceSegmenter, Token};

/// Words with internal apostrophes, hyphens, ampersands or periods stay
/// whole; every other non-space character is its own token.
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['’.\-&][\p{L}\p{N}]+)*|[^\s\p{L}\p{N}]")
        .expect("token pattern is valid")
});

static ENGLISH_RULES: Lazy<Arc<Rules>> = Lazy::new(|| {
    let srx = SRX::from_str(include_str!("../assets/segment.srx"))
        .expect("bundled segmentation rules are valid");
    Arc::new(srx.language_rules("en"))
});

/// Split `text` into tokens with byte offsets
pub fn tokenize(text: &str) -> Vec<Token> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| Token::new(m.as_str(), m.start(), m.end()))
        .collect()
}

/// SRX rule-based sentence segmenter
#[derive(Clone)]
pub struct RuleSegmenter {
    rules: Arc<Rules>,
}

impl RuleSegmenter {
    /// Segmenter using the bundled English rules
    pub fn new() -> Self {
        Self {
            rules: ENGLISH_RULES.clone(),
        }
    }

    /// Segmenter using the rules an SRX document maps to `language`
    pub fn from_srx(rules: &str, language: &str) -> Result<Self> {
        let srx = SRX::from_str(rules)
            .map_err(|e| IseError::ConfigError(format!("Invalid segmentation rules: {e}")))?;
        Ok(Self {
            rules: Arc::new(srx.language_rules(language)),
        })
    }

    /// Build a sentence from one segment, or `None` if it holds no tokens
    fn build_sentence(segment: &str) -> Option<Sentence> {
        let trimmed = segment.trim();
        let tokens = tokenize(trimmed);
        if tokens.is_empty() {
            return None;
        }
        Some(Sentence::new(trimmed, tokens))
    }
}

impl Default for RuleSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl SentenceSegmenter for RuleSegmenter {
    fn segment(&self, text: &str) -> Result<Vec<Sentence>> {
        Ok(self
            .rules
            .split_ranges(text)
            .into_iter()
            .filter_map(|range| Self::build_sentence(&text[range]))
            .collect())
    }
}
