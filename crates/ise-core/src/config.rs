//! Run configuration
//!
//! Every section has working defaults. A TOML file may replace any subset of
//! them and environment variables take precedence over the file; the binary
//! applies its own flags last.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::relations::{RelationSpec, RelationTable};

/// Service endpoints, credentials and loop limits for one run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Web search configuration
    pub search: SearchConfig,

    /// Completion service configuration
    pub llm: LlmConfig,

    /// Span-pair inference service configuration
    pub inference: InferenceConfig,

    /// Entity tagger configuration
    pub ner: NerConfig,

    /// Extraction loop configuration
    pub extraction: ExtractionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Custom relation table (replaces the built-in one when non-empty)
    pub relations: Vec<RelationSpec>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Search
        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Ok(id) = std::env::var("GOOGLE_ENGINE_ID") {
            self.search.engine_id = Some(id);
        }

        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            self.llm.openai_base_url = Some(url);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.llm.ollama_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            self.llm.model = model;
        }

        // Inference and NER services
        if let Ok(url) = std::env::var("SPAN_PAIR_URL") {
            self.inference.endpoint = Some(url);
        }
        if let Ok(url) = std::env::var("NER_URL") {
            self.ner.endpoint = Some(url);
        }
        if let Ok(path) = std::env::var("GAZETTEER_PATH") {
            self.ner.gazetteer_path = Some(PathBuf::from(path));
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Relation table to use: the configured one if present, else the built-in
    pub fn relation_table(&self) -> crate::Result<RelationTable> {
        if self.relations.is_empty() {
            Ok(RelationTable::builtin())
        } else {
            RelationTable::new(self.relations.clone())
        }
    }
}

/// Web search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Google Custom Search API key
    pub api_key: Option<String>,

    /// Google Custom Search engine ID
    pub engine_id: Option<String>,

    /// Custom Search endpoint
    pub endpoint: String,

    /// Results requested per query
    pub results_per_query: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            engine_id: None,
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            results_per_query: 10,
            timeout_secs: 30,
        }
    }
}

/// Completion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for OpenAI-compatible servers)
    pub openai_base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Stop sequences
    pub stop: Vec<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "gpt-3.5-turbo-instruct".to_string(),
            max_tokens: 100,
            temperature: 0.2,
            stop: vec!["\n".to_string()],
            timeout_secs: 60,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Span-pair inference service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of the inference service
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 120,
        }
    }
}

/// Entity tagger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NerConfig {
    /// Remote NER endpoint; takes precedence over the gazetteer
    pub endpoint: Option<String>,

    /// JSON gazetteer for the dictionary tagger
    pub gazetteer_path: Option<PathBuf>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for NerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            gazetteer_path: None,
            timeout_secs: 30,
        }
    }
}

/// Extraction loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Page text is truncated to this many characters
    pub max_page_chars: usize,

    /// Upper bound on search iterations
    pub max_iterations: usize,

    /// Page fetch timeout in seconds
    pub fetch_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_page_chars: 10_000,
            max_iterations: 20,
            fetch_timeout_secs: 20,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.llm.max_tokens, 100);
        assert_eq!(config.llm.stop, vec!["\n".to_string()]);
        assert_eq!(config.search.results_per_query, 10);
        assert_eq!(config.extraction.max_page_chars, 10_000);
    }

    #[test]
    fn test_llm_provider_parse() {
        assert_eq!(
            "openai".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAI
        );
        assert_eq!(
            "ollama".parse::<LlmProvider>().unwrap(),
            LlmProvider::Ollama
        );
        assert!("invalid".parse::<LlmProvider>().is_err());
        assert!("azure".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [llm]
            model = "llama3"
            provider = "ollama"

            [extraction]
            max_iterations = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.max_tokens, 100);
        assert_eq!(config.extraction.max_iterations, 3);
        assert_eq!(config.extraction.max_page_chars, 10_000);
    }

    #[test]
    fn test_relation_table_override() {
        let config: AppConfig = toml::from_str(
            r#"
            [[relations]]
            id = 7
            name = "Born_In"
            interest_types = ["PERSON", "CITY"]
            subject_types = ["PERSON"]
            object_types = ["CITY"]
            model_labels = ["per:city_of_birth"]
            description = "the subject is a PERSON born in the CITY."

            [relations.seed]
            sentence = "Ada Lovelace was born in London."
            output = '{"PERSON": "Ada Lovelace", "CITY": "London", "relation": "Born_In"}'
            "#,
        )
        .unwrap();
        let table = config.relation_table().unwrap();
        assert_eq!(table.spec(7).unwrap().name, "Born_In");
        assert!(table.spec(1).is_err());
    }

    #[test]
    fn test_default_relation_table_is_builtin() {
        let table = AppConfig::default().relation_table().unwrap();
        assert_eq!(table.ids().count(), 4);
    }
}
