//! Span-pair model client
//!
//! Talks to a model server exposing `GET /health` and `POST /predict`.
//! The predict endpoint takes `{"pairs": [...]}` with each candidate's
//! tokens and subject/object spans and answers with one
//! `{"label", "confidence"}` per pair, in input order.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ise_core::{
    CandidatePair, ConfigError, InferenceConfig, IseError, RelationPrediction, Result,
    SpanPairModel,
};

use crate::http_client;

/// HTTP span-pair relation model
pub struct HttpSpanPairModel {
    client: Client,
    endpoint: String,
    requests: u64,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    pairs: Vec<PairPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct PairPayload<'a> {
    tokens: &'a [String],
    subj_start: usize,
    subj_end: usize,
    subj_type: &'static str,
    obj_start: usize,
    obj_end: usize,
    obj_type: &'static str,
}

impl<'a> From<&'a CandidatePair> for PairPayload<'a> {
    fn from(pair: &'a CandidatePair) -> Self {
        Self {
            tokens: &pair.tokens,
            subj_start: pair.subj.start,
            subj_end: pair.subj.end,
            subj_type: pair.subj.entity_type.as_str(),
            obj_start: pair.obj.start,
            obj_end: pair.obj.end,
            obj_type: pair.obj.entity_type.as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<RelationPrediction>,
}

impl HttpSpanPairModel {
    /// Create a client without checking the server
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            requests: 0,
        })
    }

    /// Create from config and verify the server answers its health check.
    ///
    /// The model is loaded once, before any search traffic, so a missing
    /// server fails the run up front.
    pub async fn connect(config: &InferenceConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| ConfigError::MissingRequired("SPAN_PAIR_URL".to_string()))?;
        let model = Self::new(endpoint, config.timeout_secs)?;
        model.health_check().await?;
        info!(endpoint = %model.endpoint, "Span-pair model ready");
        Ok(model)
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.endpoint))
            .send()
            .await
            .map_err(|e| IseError::InferenceError(format!("Model server unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(IseError::InferenceError(format!(
                "Model server unhealthy ({})",
                response.status()
            )));
        }
        Ok(())
    }

    /// Number of predict requests sent so far
    pub fn requests(&self) -> u64 {
        self.requests
    }
}

#[async_trait]
impl SpanPairModel for HttpSpanPairModel {
    async fn predict(&mut self, pairs: &[CandidatePair]) -> Result<Vec<RelationPrediction>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let body = PredictRequest {
            pairs: pairs.iter().map(PairPayload::from).collect(),
        };

        self.requests += 1;
        let response = self
            .client
            .post(format!("{}/predict", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| IseError::InferenceError(format!("Predict request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(IseError::InferenceError(format!(
                "Model server error ({status}): {error_text}"
            )));
        }

        let result: PredictResponse = response
            .json()
            .await
            .map_err(|e| IseError::InferenceError(format!("Failed to parse predictions: {e}")))?;

        if let Some(bad) = result
            .predictions
            .iter()
            .find(|p| !(0.0..=1.0).contains(&p.confidence))
        {
            return Err(IseError::InferenceError(format!(
                "Confidence {} for label {} is outside [0, 1]",
                bad.confidence, bad.label
            )));
        }

        debug!(
            pairs = pairs.len(),
            predictions = result.predictions.len(),
            "Span-pair batch classified"
        );
        Ok(result.predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ise_core::{EntityMention, EntityType};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pair() -> CandidatePair {
        CandidatePair {
            tokens: ["Bill", "Gates", "founded", "Microsoft", "."]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            subj: EntityMention::new("Bill Gates", EntityType::Person, 0, 2),
            obj: EntityMention::new("Microsoft", EntityType::Organization, 3, 4),
            sentence: "Bill Gates founded Microsoft.".to_string(),
        }
    }

    async fn healthy_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_connect_requires_endpoint() {
        let result = HttpSpanPairModel::connect(&InferenceConfig::default()).await;
        assert!(matches!(result, Err(IseError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_connect_fails_when_unhealthy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let config = InferenceConfig {
            endpoint: Some(server.uri()),
            ..Default::default()
        };
        let result = HttpSpanPairModel::connect(&config).await;
        assert!(matches!(result, Err(IseError::InferenceError(_))));
    }

    #[tokio::test]
    async fn test_predict_sends_spans() {
        let server = healthy_server().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(body_partial_json(json!({
                "pairs": [{
                    "subj_start": 0,
                    "subj_end": 2,
                    "subj_type": "PERSON",
                    "obj_start": 3,
                    "obj_end": 4,
                    "obj_type": "ORGANIZATION"
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{"label": "per:employee_of", "confidence": 0.9}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = InferenceConfig {
            endpoint: Some(server.uri()),
            ..Default::default()
        };
        let mut model = HttpSpanPairModel::connect(&config).await.unwrap();
        let predictions = model.predict(&[pair()]).await.unwrap();

        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].label, "per:employee_of");
        assert!((predictions[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(model.requests(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mut model = HttpSpanPairModel::new(server.uri(), 5).unwrap();
        assert!(model.predict(&[]).await.unwrap().is_empty());
        assert_eq!(model.requests(), 0);
    }

    #[tokio::test]
    async fn test_server_error_is_inference_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory"))
            .mount(&server)
            .await;

        let mut model = HttpSpanPairModel::new(server.uri(), 5).unwrap();
        let err = model.predict(&[pair()]).await.unwrap_err();
        assert!(matches!(err, IseError::InferenceError(ref msg) if msg.contains("CUDA")));
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_rejected() {
        for confidence in [1.7, -0.2] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/predict"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "predictions": [{"label": "per:employee_of", "confidence": confidence}]
                })))
                .mount(&server)
                .await;

            let mut model = HttpSpanPairModel::new(server.uri(), 5).unwrap();
            let err = model.predict(&[pair()]).await.unwrap_err();
            assert!(matches!(err, IseError::InferenceError(ref msg) if msg.contains("outside")));
        }
    }

    #[tokio::test]
    async fn test_non_numeric_confidence_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"predictions": [{"label": "per:employee_of", "confidence": NaN}]}"#,
            ))
            .mount(&server)
            .await;

        let mut model = HttpSpanPairModel::new(server.uri(), 5).unwrap();
        assert!(matches!(
            model.predict(&[pair()]).await,
            Err(IseError::InferenceError(_))
        ));
    }
}
