//! ISE Clients - HTTP collaborators for the extraction loop
//!
//! Implements the `ise-core` collaborator traits against remote services:
//! - completion: OpenAI-compatible and Ollama APIs
//! - span-pair inference: a JSON model server
//! - entity tagging: a JSON NER server
//! - web search: Google Custom Search
//! - page fetching: HTML download and visible-text extraction

use std::time::Duration;

use reqwest::Client;

use ise_core::{IseError, Result};

pub mod fetch;
pub mod llm;
pub mod ner;
pub mod search;
pub mod spanpair;

pub use fetch::{visible_text, HttpPageFetcher};
pub use llm::{create_completion_client, OllamaCompletionClient, OpenAiCompletionClient};
pub use ner::HttpTagger;
pub use search::GoogleSearchClient;
pub use spanpair::HttpSpanPairModel;

pub(crate) fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| IseError::ConfigError(format!("Failed to build HTTP client: {e}")))
}
