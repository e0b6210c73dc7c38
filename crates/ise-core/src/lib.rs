//! ISE Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the ISE system:
//! - Text models (sentences, tokens, entity mentions, candidate pairs)
//! - Relation tables (which entity types make up each target relation)
//! - Common error types
//! - Collaborator traits (segmenter, tagger, span-pair model, completion,
//!   web search, page fetch)
//! - Configuration management

pub mod config;
pub mod relations;

pub use config::{
    AppConfig, ConfigError, ExtractionConfig, InferenceConfig, LlmConfig, LlmProvider,
    LoggingConfig, NerConfig, SearchConfig,
};
pub use relations::{RelationSpec, RelationTable, SeedExample};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for ISE operations
#[derive(Error, Debug)]
pub enum IseError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Segmenter error: {0}")]
    SegmenterError(String),

    #[error("Tagger error: {0}")]
    TaggerError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Completion error: {0}")]
    CompletionError(String),

    #[error("Search error: {0}")]
    SearchError(String),

    #[error("Fetch error: {0}")]
    FetchError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IseError {
    /// Whether the error came from an external collaborator (service outage,
    /// bad response) rather than from configuration.
    pub fn is_collaborator(&self) -> bool {
        matches!(
            self,
            Self::SegmenterError(_)
                | Self::TaggerError(_)
                | Self::InferenceError(_)
                | Self::CompletionError(_)
                | Self::SearchError(_)
                | Self::FetchError(_)
        )
    }
}

impl From<ConfigError> for IseError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IseError>;

// ============================================================================
// Entity Types
// ============================================================================

/// Entity types produced by the sentence tagger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Person,
    Organization,
    Location,
    City,
    StateOrProvince,
    Country,
    Date,
    Misc,
}

impl EntityType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "PERSON",
            Self::Organization => "ORGANIZATION",
            Self::Location => "LOCATION",
            Self::City => "CITY",
            Self::StateOrProvince => "STATE_OR_PROVINCE",
            Self::Country => "COUNTRY",
            Self::Date => "DATE",
            Self::Misc => "MISC",
        }
    }

    /// Map a tagger label to an entity type.
    ///
    /// Accepts the canonical names plus the short labels used by common NER
    /// models (`ORG`, `GPE`, `LOC`, `PER`). Anything else is `Misc`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "PERSON" | "PER" => Self::Person,
            "ORGANIZATION" | "ORG" => Self::Organization,
            "LOCATION" | "LOC" | "GPE" => Self::Location,
            "CITY" => Self::City,
            "STATE_OR_PROVINCE" | "STATE" | "PROVINCE" => Self::StateOrProvince,
            "COUNTRY" => Self::Country,
            "DATE" => Self::Date,
            _ => Self::Misc,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Text Models
// ============================================================================

/// A token inside a sentence, with byte offsets into the sentence text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn new(text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// A typed entity span inside one sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMention {
    /// Surface text
    pub text: String,

    /// Entity type assigned by the tagger
    #[serde(rename = "type")]
    pub entity_type: EntityType,

    /// First token index (inclusive)
    pub start: usize,

    /// Last token index (exclusive)
    pub end: usize,
}

impl EntityMention {
    /// Create a new mention over the token span `start..end`
    pub fn new(text: impl Into<String>, entity_type: EntityType, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            entity_type,
            start,
            end,
        }
    }

    /// Two mentions are the same mention when they cover the same tokens
    pub fn same_span(&self, other: &EntityMention) -> bool {
        self.start == other.start && self.end == other.end
    }
}

/// A sentence produced by the segmenter, with mentions attached after tagging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    /// Sentence text
    pub text: String,

    /// Ordered tokens
    pub tokens: Vec<Token>,

    /// Entity mentions in document order (empty until tagged)
    pub mentions: Vec<EntityMention>,
}

impl Sentence {
    /// Create an untagged sentence
    pub fn new(text: impl Into<String>, tokens: Vec<Token>) -> Self {
        Self {
            text: text.into(),
            tokens,
            mentions: Vec::new(),
        }
    }

    /// Attach tagger output, sorted into document order
    pub fn with_mentions(mut self, mut mentions: Vec<EntityMention>) -> Self {
        mentions.sort_by_key(|m| (m.start, m.end));
        self.mentions = mentions;
        self
    }

    /// Token texts in order
    pub fn token_texts(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.text.clone()).collect()
    }

    /// Map a byte range of the sentence text onto the token span it overlaps.
    ///
    /// Returns `None` when the range touches no token.
    pub fn token_span(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let first = self.tokens.iter().position(|t| t.end > start)?;
        let last = self.tokens.iter().rposition(|t| t.start < end)?;
        if first > last {
            return None;
        }
        Some((first, last + 1))
    }
}

/// An ordered (subject, object) mention pair proposed for classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePair {
    /// Tokens of the sentence containing both mentions
    pub tokens: Vec<String>,
    pub subj: EntityMention,
    pub obj: EntityMention,
    /// Sentence text
    pub sentence: String,
}

/// Span-pair model output for one candidate pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationPrediction {
    pub label: String,
    /// Score in [0, 1]; calibration is not guaranteed
    pub confidence: f32,
}

/// A classified (subject, relation, object) triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRelation {
    pub subj: String,
    pub obj: String,
    pub relation: String,

    /// Only the span-pair strategy produces a score; prompted completions
    /// carry `None`.
    pub confidence: Option<f32>,

    /// Sentence the triple was extracted from
    pub sentence: String,
}

// ============================================================================
// Collaborator Types
// ============================================================================

/// Request sent to a text completion service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Hard cap on generated tokens
    pub max_tokens: u32,
    pub temperature: f32,
    pub stop: Vec<String>,
}

/// One web search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: Option<String>,
}

// ============================================================================
// Traits
// ============================================================================

/// Splits raw text into tokenized sentences
pub trait SentenceSegmenter: Send + Sync {
    fn segment(&self, text: &str) -> Result<Vec<Sentence>>;
}

/// Named entity recognizer applied per sentence
#[async_trait::async_trait]
pub trait EntityTagger: Send + Sync {
    /// Return the typed entity spans found in `sentence`
    async fn tag(&self, sentence: &Sentence) -> Result<Vec<EntityMention>>;

    /// Get tagger name for logging
    fn name(&self) -> &str;
}

/// Pretrained span-pair relation classifier.
///
/// Implementations are loaded once and are not assumed to be reentrant,
/// which is why prediction takes `&mut self`.
#[async_trait::async_trait]
pub trait SpanPairModel: Send {
    /// Score each pair; the output has the same length and order as `pairs`
    async fn predict(&mut self, pairs: &[CandidatePair]) -> Result<Vec<RelationPrediction>>;
}

/// Generative text completion service
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Web search backend used by the driver
#[async_trait::async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Fetches a page and returns its visible text, or `None` if it has none
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<Option<String>>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(text: &str) -> Sentence {
        let mut tokens = Vec::new();
        let mut offset = 0;
        for word in text.split(' ') {
            tokens.push(Token::new(word, offset, offset + word.len()));
            offset += word.len() + 1;
        }
        Sentence::new(text, tokens)
    }

    #[test]
    fn test_entity_type_labels() {
        assert_eq!(EntityType::from_label("ORG"), EntityType::Organization);
        assert_eq!(EntityType::from_label("gpe"), EntityType::Location);
        assert_eq!(
            EntityType::from_label("STATE_OR_PROVINCE"),
            EntityType::StateOrProvince
        );
        assert_eq!(EntityType::from_label("WORK_OF_ART"), EntityType::Misc);
        assert_eq!(EntityType::StateOrProvince.to_string(), "STATE_OR_PROVINCE");
    }

    #[test]
    fn test_entity_type_serde() {
        let json = serde_json::to_string(&EntityType::StateOrProvince).unwrap();
        assert_eq!(json, "\"STATE_OR_PROVINCE\"");
        let parsed: EntityType = serde_json::from_str("\"ORGANIZATION\"").unwrap();
        assert_eq!(parsed, EntityType::Organization);
    }

    #[test]
    fn test_token_span_mapping() {
        let s = sentence("Alec Radford works at OpenAI");
        // "Alec Radford" = bytes 0..12
        assert_eq!(s.token_span(0, 12), Some((0, 2)));
        let start = s.text.find("OpenAI").unwrap();
        assert_eq!(s.token_span(start, start + 6), Some((4, 5)));
        assert_eq!(s.token_span(100, 120), None);
    }

    #[test]
    fn test_with_mentions_sorts() {
        let s = sentence("a b c").with_mentions(vec![
            EntityMention::new("c", EntityType::Person, 2, 3),
            EntityMention::new("a", EntityType::Person, 0, 1),
        ]);
        assert_eq!(s.mentions[0].text, "a");
        assert_eq!(s.token_texts(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_collaborator_classification() {
        assert!(IseError::CompletionError("down".into()).is_collaborator());
        assert!(!IseError::ConfigError("bad".into()).is_collaborator());
    }
}
