//! Google Custom Search client

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use ise_core::{ConfigError, IseError, Result, SearchConfig, SearchHit, WebSearch};

use crate::http_client;

/// The Custom Search API returns at most ten results per request
const MAX_RESULTS_PER_REQUEST: usize = 10;

/// Web search over the Google Custom Search JSON API
pub struct GoogleSearchClient {
    client: Client,
    api_key: String,
    engine_id: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    link: String,
    #[serde(default)]
    title: String,
    snippet: Option<String>,
}

impl From<Item> for SearchHit {
    fn from(item: Item) -> Self {
        SearchHit {
            url: item.link,
            title: item.title,
            snippet: item.snippet,
        }
    }
}

impl GoogleSearchClient {
    /// Create from config; both the API key and engine ID are required
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ConfigError::MissingRequired("GOOGLE_API_KEY".to_string()))?;
        let engine_id = config
            .engine_id
            .clone()
            .ok_or_else(|| ConfigError::MissingRequired("GOOGLE_ENGINE_ID".to_string()))?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            engine_id,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl WebSearch for GoogleSearchClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let num = limit.clamp(1, MAX_RESULTS_PER_REQUEST).to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| IseError::SearchError(format!("Search request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(IseError::SearchError(format!(
                "Search API error ({status}): {error_text}"
            )));
        }

        let result: SearchResponse = response
            .json()
            .await
            .map_err(|e| IseError::SearchError(format!("Failed to parse search results: {e}")))?;

        let hits: Vec<SearchHit> = result.items.into_iter().map(SearchHit::from).collect();
        debug!(query, hits = hits.len(), "Search completed");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: String) -> SearchConfig {
        SearchConfig {
            api_key: Some("key-123".to_string()),
            engine_id: Some("engine-456".to_string()),
            endpoint,
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_credentials() {
        let missing_key = SearchConfig::default();
        assert!(matches!(
            GoogleSearchClient::from_config(&missing_key),
            Err(IseError::ConfigError(_))
        ));

        let missing_engine = SearchConfig {
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            GoogleSearchClient::from_config(&missing_engine),
            Err(IseError::ConfigError(ref msg)) if msg.contains("GOOGLE_ENGINE_ID")
        ));
    }

    #[tokio::test]
    async fn test_search_returns_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .and(query_param("key", "key-123"))
            .and(query_param("cx", "engine-456"))
            .and(query_param("q", "bill gates microsoft"))
            .and(query_param("num", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"link": "https://example.com/a", "title": "A", "snippet": "first"},
                    {"link": "https://example.com/b", "title": "B"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            GoogleSearchClient::from_config(&config(format!("{}/customsearch/v1", server.uri())))
                .unwrap();
        let hits = client.search("bill gates microsoft", 25).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://example.com/a");
        assert_eq!(hits[0].snippet.as_deref(), Some("first"));
        assert_eq!(hits[1].snippet, None);
    }

    #[tokio::test]
    async fn test_no_items_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "searchInformation": {"totalResults": "0"}
            })))
            .mount(&server)
            .await;

        let client = GoogleSearchClient::from_config(&config(server.uri())).unwrap();
        assert!(client.search("nothing", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quota_error_is_search_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("dailyLimitExceeded"))
            .mount(&server)
            .await;

        let client = GoogleSearchClient::from_config(&config(server.uri())).unwrap();
        let err = client.search("q", 10).await.unwrap_err();
        assert!(matches!(err, IseError::SearchError(ref msg) if msg.contains("dailyLimitExceeded")));
    }
}
