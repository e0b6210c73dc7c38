//! Remote named-entity tagger
//!
//! Sends one sentence per request to a JSON NER server:
//! `POST {endpoint}` with `{"text": "..."}`, answered by
//! `{"entities": [{"text", "label", "start", "end"}]}` where offsets are
//! character positions in the sentence. Entities are mapped back onto the
//! sentence's tokens; entities that cover no token are dropped.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ise_core::{
    ConfigError, EntityMention, EntityTagger, EntityType, IseError, NerConfig, Result, Sentence,
};

use crate::http_client;

/// HTTP entity tagger
pub struct HttpTagger {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct TagRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TagResponse {
    #[serde(default)]
    entities: Vec<RemoteEntity>,
}

#[derive(Debug, Deserialize)]
struct RemoteEntity {
    text: String,
    label: String,
    start: usize,
    end: usize,
}

impl HttpTagger {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            endpoint: endpoint.into(),
        })
    }

    /// Create from config
    pub fn from_config(config: &NerConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| ConfigError::MissingRequired("NER_URL".to_string()))?;
        Self::new(endpoint, config.timeout_secs)
    }
}

/// Byte offset of the `char_idx`-th character, clamped to the text end
fn byte_offset(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

fn to_mention(sentence: &Sentence, entity: RemoteEntity) -> Option<EntityMention> {
    if entity.end <= entity.start {
        return None;
    }
    let start = byte_offset(&sentence.text, entity.start);
    let end = byte_offset(&sentence.text, entity.end);
    let (first, last) = sentence.token_span(start, end)?;
    Some(EntityMention::new(
        entity.text,
        EntityType::from_label(&entity.label),
        first,
        last,
    ))
}

#[async_trait]
impl EntityTagger for HttpTagger {
    async fn tag(&self, sentence: &Sentence) -> Result<Vec<EntityMention>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&TagRequest {
                text: &sentence.text,
            })
            .send()
            .await
            .map_err(|e| IseError::TaggerError(format!("NER request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(IseError::TaggerError(format!(
                "NER server error ({status}): {error_text}"
            )));
        }

        let result: TagResponse = response
            .json()
            .await
            .map_err(|e| IseError::TaggerError(format!("Failed to parse entities: {e}")))?;

        let received = result.entities.len();
        let mentions: Vec<EntityMention> = result
            .entities
            .into_iter()
            .filter_map(|e| to_mention(sentence, e))
            .collect();

        if mentions.len() < received {
            debug!(
                dropped = received - mentions.len(),
                "Entities outside sentence tokens dropped"
            );
        }
        Ok(mentions)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ise_core::Token;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sentence() -> Sentence {
        let text = "Zoë Ball joined the BBC.";
        let tokens = vec![
            Token::new("Zoë", 0, 4),
            Token::new("Ball", 5, 9),
            Token::new("joined", 10, 16),
            Token::new("the", 17, 20),
            Token::new("BBC", 21, 24),
            Token::new(".", 24, 25),
        ];
        Sentence::new(text, tokens)
    }

    #[test]
    fn test_byte_offset_handles_multibyte() {
        let text = "Zoë Ball";
        assert_eq!(byte_offset(text, 3), 4);
        assert_eq!(byte_offset(text, 100), text.len());
    }

    #[tokio::test]
    async fn test_tag_maps_char_offsets_to_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ner"))
            .and(body_json(json!({"text": "Zoë Ball joined the BBC."})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": [
                    {"text": "Zoë Ball", "label": "PER", "start": 0, "end": 8},
                    {"text": "BBC", "label": "ORG", "start": 20, "end": 23},
                    {"text": "ghost", "label": "ORG", "start": 40, "end": 45}
                ]
            })))
            .mount(&server)
            .await;

        let tagger = HttpTagger::new(format!("{}/ner", server.uri()), 5).unwrap();
        let mentions = tagger.tag(&sentence()).await.unwrap();

        assert_eq!(
            mentions,
            vec![
                EntityMention::new("Zoë Ball", EntityType::Person, 0, 2),
                EntityMention::new("BBC", EntityType::Organization, 4, 5),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_entities_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let tagger = HttpTagger::new(server.uri(), 5).unwrap();
        assert!(tagger.tag(&sentence()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_tagger_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tagger = HttpTagger::new(server.uri(), 5).unwrap();
        assert!(matches!(
            tagger.tag(&sentence()).await,
            Err(IseError::TaggerError(_))
        ));
    }

    #[test]
    fn test_from_config_requires_endpoint() {
        assert!(matches!(
            HttpTagger::from_config(&NerConfig::default()),
            Err(IseError::ConfigError(_))
        ));
    }
}
