//! Relation classification
//!
//! Two strategies decide whether a candidate pair expresses the target
//! relation:
//! - Span-pair: a pretrained model scores whole batches of pairs and returns
//!   a (label, confidence) per pair.
//! - Prompted completion: each pair's sentence is embedded in a prompt for a
//!   text completion service, whose answer is parsed as a JSON assertion.
//!   This strategy has no confidence score.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use ise_core::{
    CandidatePair, CompletionClient, CompletionRequest, ExtractedRelation, IseError, LlmConfig,
    RelationPrediction, RelationSpec, Result, SpanPairModel,
};

// ============================================================================
// Span-pair classifier
// ============================================================================

/// Batched classifier backed by a span-pair model.
///
/// The model handle is owned exclusively and is loaded once by whoever
/// constructs it. Calls take `&mut self`, so concurrent use needs external
/// serialization.
pub struct SpanPairClassifier {
    spec: RelationSpec,
    model: Box<dyn SpanPairModel>,
}

impl SpanPairClassifier {
    pub fn new(spec: RelationSpec, model: Box<dyn SpanPairModel>) -> Self {
        Self { spec, model }
    }

    pub fn spec(&self) -> &RelationSpec {
        &self.spec
    }

    /// Score every pair, returning one prediction per pair in input order.
    ///
    /// `pairs` must not be empty: model invocations are expensive and callers
    /// are expected to skip the call when nothing survived filtering.
    pub async fn classify(&mut self, pairs: &[CandidatePair]) -> Result<Vec<RelationPrediction>> {
        debug_assert!(!pairs.is_empty(), "span-pair classifier called with no pairs");

        let predictions = self.model.predict(pairs).await?;
        if predictions.len() != pairs.len() {
            return Err(IseError::InferenceError(format!(
                "model returned {} predictions for {} pairs",
                predictions.len(),
                pairs.len()
            )));
        }

        for (pair, prediction) in pairs.iter().zip(&predictions) {
            debug!(
                subject = %pair.subj.text,
                object = %pair.obj.text,
                label = %prediction.label,
                confidence = prediction.confidence,
                "span-pair prediction"
            );
        }

        Ok(predictions)
    }

    /// Classify and keep the pairs predicted as the target relation
    pub async fn classify_relations(
        &mut self,
        pairs: &[CandidatePair],
    ) -> Result<Vec<ExtractedRelation>> {
        let predictions = self.classify(pairs).await?;
        Ok(to_relations(&self.spec, pairs, &predictions))
    }
}

/// Turn predictions into relations, dropping labels of other relations
pub fn to_relations(
    spec: &RelationSpec,
    pairs: &[CandidatePair],
    predictions: &[RelationPrediction],
) -> Vec<ExtractedRelation> {
    pairs
        .iter()
        .zip(predictions)
        .filter(|(_, prediction)| spec.matches_label(&prediction.label))
        .map(|(pair, prediction)| ExtractedRelation {
            subj: pair.subj.text.clone(),
            obj: pair.obj.text.clone(),
            relation: spec.name.clone(),
            confidence: Some(prediction.confidence),
            sentence: pair.sentence.clone(),
        })
        .collect()
}

// ============================================================================
// Prompted-completion classifier
// ============================================================================

/// Sampling options for completion requests
#[derive(Debug, Clone, PartialEq)]
pub struct PromptOptions {
    /// Hard cap on generated tokens
    pub max_tokens: u32,
    pub temperature: f32,
    /// Stop sequences; a newline keeps the model to one answer
    pub stop: Vec<String>,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            max_tokens: 100,
            temperature: 0.2,
            stop: vec!["\n".to_string()],
        }
    }
}

impl From<&LlmConfig> for PromptOptions {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            stop: config.stop.clone(),
        }
    }
}

/// Why a completion was not accepted as a relation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseRejection {
    #[error("completion is not a JSON object: {0}")]
    Malformed(String),

    #[error("completion has no usable {0} field")]
    MissingField(&'static str),

    #[error("completion asserts {found:?}, expected {expected:?}")]
    RelationMismatch { expected: String, found: String },
}

/// Build the completion prompt for one pair.
///
/// The prompt is the relation description, the relation's seed example, and
/// the pair's sentence as the input to complete.
pub fn build_prompt(spec: &RelationSpec, pair: &CandidatePair) -> String {
    let sentence = pair.sentence.split_whitespace().collect::<Vec<_>>().join(" ");
    format!(
        "In a given sentence, find relations where {}\n\
         Example Input: '{}' Example Output: {}\n\
         Input: '{}' Output:",
        spec.description, spec.seed.sentence, spec.seed.output, sentence
    )
}

/// Look up the first non-empty string field among `names`
fn string_field(object: &serde_json::Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        object
            .get(*name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Parse a completion into a relation for `spec`.
///
/// The subject is read from the field named after one of the relation's
/// subject types (e.g. `PERSON`), falling back to `subj`; the object likewise
/// from an object type name or `obj`. The `relation` field must equal the
/// canonical relation name exactly.
pub fn parse_completion(
    spec: &RelationSpec,
    raw: &str,
    sentence: &str,
) -> std::result::Result<ExtractedRelation, ParseRejection> {
    let text = raw.trim();
    let text = text.strip_suffix('.').unwrap_or(text).trim_end();

    let value: Value =
        serde_json::from_str(text).map_err(|e| ParseRejection::Malformed(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| ParseRejection::Malformed("expected a JSON object".to_string()))?;

    let mut subject_names: Vec<&str> = spec.subject_types.iter().map(|t| t.as_str()).collect();
    subject_names.push("subj");
    let mut object_names: Vec<&str> = spec.object_types.iter().map(|t| t.as_str()).collect();
    object_names.push("obj");

    let subj = string_field(object, &subject_names).ok_or(ParseRejection::MissingField("subject"))?;
    let obj = string_field(object, &object_names).ok_or(ParseRejection::MissingField("object"))?;
    let relation = object
        .get("relation")
        .and_then(Value::as_str)
        .ok_or(ParseRejection::MissingField("relation"))?;

    if relation != spec.name {
        return Err(ParseRejection::RelationMismatch {
            expected: spec.name.clone(),
            found: relation.to_string(),
        });
    }

    Ok(ExtractedRelation {
        subj,
        obj,
        relation: relation.to_string(),
        confidence: None,
        sentence: sentence.to_string(),
    })
}

/// Per-pair classifier backed by a text completion service
pub struct PromptedClassifier {
    spec: RelationSpec,
    client: Arc<dyn CompletionClient>,
    options: PromptOptions,
}

impl PromptedClassifier {
    pub fn new(spec: RelationSpec, client: Arc<dyn CompletionClient>, options: PromptOptions) -> Self {
        Self {
            spec,
            client,
            options,
        }
    }

    pub fn spec(&self) -> &RelationSpec {
        &self.spec
    }

    /// Build the completion request for a pair
    pub fn request_for(&self, pair: &CandidatePair) -> CompletionRequest {
        CompletionRequest {
            prompt: build_prompt(&self.spec, pair),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            stop: self.options.stop.clone(),
        }
    }

    /// Classify one pair.
    ///
    /// Service failures are returned as errors and not retried. A completion
    /// that cannot be parsed, or that asserts a different relation, yields
    /// `Ok(None)`.
    pub async fn classify(&self, pair: &CandidatePair) -> Result<Option<ExtractedRelation>> {
        let request = self.request_for(pair);
        debug!(prompt = %request.prompt, "requesting completion");

        let completion = self.client.complete(&request).await?;

        match parse_completion(&self.spec, &completion, &pair.sentence) {
            Ok(relation) => {
                debug!(
                    subject = %relation.subj,
                    object = %relation.obj,
                    relation = %relation.relation,
                    "completion accepted"
                );
                Ok(Some(relation))
            }
            Err(rejection) => {
                warn!(%rejection, completion = %completion, "completion rejected");
                Ok(None)
            }
        }
    }
}

// ============================================================================
// Strategy selection
// ============================================================================

/// Classification strategy chosen at construction time
pub enum RelationClassifier {
    SpanPair(SpanPairClassifier),
    Prompted(PromptedClassifier),
}

impl RelationClassifier {
    pub fn spec(&self) -> &RelationSpec {
        match self {
            Self::SpanPair(c) => c.spec(),
            Self::Prompted(c) => c.spec(),
        }
    }

    /// Strategy name for logging
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::SpanPair(_) => "span-pair",
            Self::Prompted(_) => "prompted",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
