//! ISE Extractor - Relation extraction pipeline
//!
//! Turns document text into relation triples:
//! sentence split → per-sentence tagging → candidate pair generation →
//! type filtering → classification (span-pair model or prompted
//! completion).

pub mod candidates;
pub mod ner;
pub mod pipeline;
pub mod relation;
pub mod text;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use candidates::{filter_pairs, generate_pairs, sentence_candidates};
pub use ner::{DictionaryEntry, GazetteerTagger};
pub use pipeline::Extractor;
pub use relation::{
    build_prompt, parse_completion, ParseRejection, PromptOptions, PromptedClassifier,
    RelationClassifier, SpanPairClassifier,
};
pub use text::{tokenize, RuleSegmenter};
