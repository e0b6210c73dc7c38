//! Per-document extraction
//!
//! [`Extractor`] runs segmentation, tagging, pair generation and filtering
//! over a document, then hands the surviving pairs to the configured
//! classifier: all at once for the span-pair strategy, one by one as they
//! are found for the prompted strategy.

use std::sync::Arc;

use tracing::{debug, info};

use crate::candidates::sentence_candidates;
use crate::relation::{PromptOptions, PromptedClassifier, RelationClassifier, SpanPairClassifier};
use ise_core::{
    CandidatePair, CompletionClient, EntityTagger, ExtractedRelation, RelationSpec, RelationTable,
    Result, Sentence, SentenceSegmenter, SpanPairModel,
};

/// Progress is logged every this many sentences
const PROGRESS_INTERVAL: usize = 5;

/// Extraction facade for one target relation
pub struct Extractor {
    segmenter: Box<dyn SentenceSegmenter>,
    tagger: Arc<dyn EntityTagger>,
    classifier: RelationClassifier,
}

impl Extractor {
    /// Create an extractor from an already built classifier
    pub fn new(
        segmenter: Box<dyn SentenceSegmenter>,
        tagger: Arc<dyn EntityTagger>,
        classifier: RelationClassifier,
    ) -> Self {
        Self {
            segmenter,
            tagger,
            classifier,
        }
    }

    /// Extractor using the span-pair strategy.
    ///
    /// Fails with a configuration error if `relation_id` is not in `table`.
    pub fn span_pair(
        table: &RelationTable,
        relation_id: u8,
        segmenter: Box<dyn SentenceSegmenter>,
        tagger: Arc<dyn EntityTagger>,
        model: Box<dyn SpanPairModel>,
    ) -> Result<Self> {
        let spec = table.spec(relation_id)?.clone();
        let classifier = RelationClassifier::SpanPair(SpanPairClassifier::new(spec, model));
        Ok(Self::new(segmenter, tagger, classifier))
    }

    /// Extractor using the prompted-completion strategy.
    ///
    /// Fails with a configuration error if `relation_id` is not in `table`.
    pub fn prompted(
        table: &RelationTable,
        relation_id: u8,
        segmenter: Box<dyn SentenceSegmenter>,
        tagger: Arc<dyn EntityTagger>,
        client: Arc<dyn CompletionClient>,
        options: PromptOptions,
    ) -> Result<Self> {
        let spec = table.spec(relation_id)?.clone();
        let classifier =
            RelationClassifier::Prompted(PromptedClassifier::new(spec, client, options));
        Ok(Self::new(segmenter, tagger, classifier))
    }

    /// The target relation
    pub fn spec(&self) -> &RelationSpec {
        self.classifier.spec()
    }

    /// Strategy name for logging
    pub fn strategy(&self) -> &'static str {
        self.classifier.strategy()
    }

    /// Whether extracted relations carry a confidence score
    pub fn is_scored(&self) -> bool {
        matches!(self.classifier, RelationClassifier::SpanPair(_))
    }

    /// Segment the document and tag every sentence
    async fn tagged_sentences(&self, text: &str) -> Result<Vec<Sentence>> {
        let sentences = self.segmenter.segment(text)?;
        info!(
            sentences = sentences.len(),
            tagger = self.tagger.name(),
            "annotating document"
        );

        let total = sentences.len();
        let mut tagged = Vec::with_capacity(total);
        for (i, sentence) in sentences.into_iter().enumerate() {
            if i > 0 && i % PROGRESS_INTERVAL == 0 {
                debug!("processed {i} / {total} sentences");
            }
            let mentions = self.tagger.tag(&sentence).await?;
            tagged.push(sentence.with_mentions(mentions));
        }
        Ok(tagged)
    }

    /// Candidate pairs of the document that fit the relation's type contract,
    /// in sentence order.
    pub async fn candidate_pairs(&self, text: &str) -> Result<Vec<CandidatePair>> {
        let spec = self.spec();
        let pairs: Vec<CandidatePair> = self
            .tagged_sentences(text)
            .await?
            .iter()
            .flat_map(|sentence| sentence_candidates(sentence, spec))
            .collect();

        for pair in &pairs {
            debug!(
                subject = %pair.subj.text,
                object = %pair.obj.text,
                sentence = %pair.sentence,
                "candidate pair"
            );
        }
        Ok(pairs)
    }

    /// Extract relations from a document.
    ///
    /// Returns an empty list without touching the classifier when no pair
    /// survives filtering.
    pub async fn extract(&mut self, text: &str) -> Result<Vec<ExtractedRelation>> {
        let relations = if self.is_scored() {
            self.extract_batch(text).await?
        } else {
            self.extract_streaming(text).await?
        };
        info!(
            relations = relations.len(),
            strategy = self.strategy(),
            "document processed"
        );
        Ok(relations)
    }

    /// Collect all pairs first, then classify them in one model call
    async fn extract_batch(&mut self, text: &str) -> Result<Vec<ExtractedRelation>> {
        let pairs = self.candidate_pairs(text).await?;
        if pairs.is_empty() {
            info!("no candidate pairs found");
            return Ok(Vec::new());
        }

        match &mut self.classifier {
            RelationClassifier::SpanPair(classifier) => classifier.classify_relations(&pairs).await,
            RelationClassifier::Prompted(_) => unreachable!("batch extraction requires span-pair"),
        }
    }

    /// Tag one sentence at a time and classify its pairs before moving on
    async fn extract_streaming(&self, text: &str) -> Result<Vec<ExtractedRelation>> {
        let RelationClassifier::Prompted(classifier) = &self.classifier else {
            unreachable!("streaming extraction requires prompted completion");
        };

        let sentences = self.segmenter.segment(text)?;
        let total = sentences.len();
        info!(
            sentences = total,
            tagger = self.tagger.name(),
            "annotating document"
        );

        let spec = classifier.spec();
        let mut relations = Vec::new();
        let mut candidates = 0;
        for (i, sentence) in sentences.into_iter().enumerate() {
            if i > 0 && i % PROGRESS_INTERVAL == 0 {
                debug!("processed {i} / {total} sentences");
            }
            let mentions = self.tagger.tag(&sentence).await?;
            let sentence = sentence.with_mentions(mentions);

            for pair in sentence_candidates(&sentence, spec) {
                candidates += 1;
                if let Some(relation) = classifier.classify(&pair).await? {
                    info!(
                        subject = %relation.subj,
                        object = %relation.obj,
                        sentence = %relation.sentence,
                        "extracted relation"
                    );
                    relations.push(relation);
                }
            }
        }

        if candidates == 0 {
            info!("no candidate pairs found");
        }
        Ok(relations)
    }
}
