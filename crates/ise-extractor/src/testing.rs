//! Testing utilities including mock collaborators.
//!
//! These let the pipeline run without a span-pair model server, a
//! completion service or a remote tagger.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use ise_core::{
    CandidatePair, CompletionClient, CompletionRequest, EntityMention, EntityTagger, IseError,
    RelationPrediction, Result, Sentence, SpanPairModel,
};

/// A span-pair model returning canned predictions.
///
/// Pairs are looked up by (subject text, object text); anything else gets
/// the default prediction. Every call records its batch size.
pub struct MockSpanPairModel {
    predictions: HashMap<(String, String), RelationPrediction>,
    default: RelationPrediction,
    truncate: bool,
    calls: Arc<Mutex<Vec<usize>>>,
}

impl MockSpanPairModel {
    pub fn new(default_label: impl Into<String>, default_confidence: f32) -> Self {
        Self {
            predictions: HashMap::new(),
            default: RelationPrediction {
                label: default_label.into(),
                confidence: default_confidence,
            },
            truncate: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a canned prediction for a (subject, object) pair
    pub fn with_prediction(
        mut self,
        subj: impl Into<String>,
        obj: impl Into<String>,
        label: impl Into<String>,
        confidence: f32,
    ) -> Self {
        self.predictions.insert(
            (subj.into(), obj.into()),
            RelationPrediction {
                label: label.into(),
                confidence,
            },
        );
        self
    }

    /// Return one prediction fewer than requested
    pub fn truncating(mut self) -> Self {
        self.truncate = true;
        self
    }

    /// Batch sizes of all calls so far
    pub fn calls(&self) -> Arc<Mutex<Vec<usize>>> {
        self.calls.clone()
    }
}

#[async_trait::async_trait]
impl SpanPairModel for MockSpanPairModel {
    async fn predict(&mut self, pairs: &[CandidatePair]) -> Result<Vec<RelationPrediction>> {
        self.calls
            .lock()
            .map_err(|_| IseError::InferenceError("mock lock poisoned".to_string()))?
            .push(pairs.len());

        let mut predictions: Vec<RelationPrediction> = pairs
            .iter()
            .map(|p| {
                self.predictions
                    .get(&(p.subj.text.clone(), p.obj.text.clone()))
                    .cloned()
                    .unwrap_or_else(|| self.default.clone())
            })
            .collect();
        if self.truncate {
            predictions.pop();
        }
        Ok(predictions)
    }
}

/// A completion client returning queued or default responses.
///
/// Queued responses are served first, in order; afterwards the default is
/// returned, or a `CompletionError` if the client was built to fail.
#[derive(Default)]
pub struct MockCompletionClient {
    queue: Mutex<VecDeque<String>>,
    default: Option<String>,
    failure: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Response used once the queue is empty
    pub fn with_default(mut self, response: impl Into<String>) -> Self {
        self.default = Some(response.into());
        self
    }

    /// Queue a one-off response
    pub fn with_response(self, response: impl Into<String>) -> Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(response.into());
        }
        self
    }

    /// Fail every call that is not served from the queue
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let queued = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        if let Some(response) = queued {
            return Ok(response);
        }
        if let Some(message) = &self.failure {
            return Err(IseError::CompletionError(message.clone()));
        }
        Ok(self.default.clone().unwrap_or_default())
    }
}

/// A tagger that always fails, for error propagation tests
pub struct FailingTagger;

#[async_trait::async_trait]
impl EntityTagger for FailingTagger {
    async fn tag(&self, _sentence: &Sentence) -> Result<Vec<EntityMention>> {
        Err(IseError::TaggerError("tagger unavailable".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}
