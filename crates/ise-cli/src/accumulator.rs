//! Accumulated relation set across iterations

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use ise_core::ExtractedRelation;

/// How new triples are admitted to the set
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcceptPolicy {
    /// Keep triples scoring at least the threshold; duplicates keep the
    /// higher score. Output is ranked by score.
    Threshold(f32),

    /// Keep every triple; the first occurrence wins. Output keeps insertion
    /// order.
    FirstSeen,
}

/// Outcome of offering a triple to the set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Added,
    Replaced,
    Duplicate,
    BelowThreshold,
}

/// Deduplicated set of extracted triples plus the queries already issued.
///
/// Triples are keyed by their whitespace-trimmed subject and object text.
pub struct RelationSet {
    policy: AcceptPolicy,
    entries: Vec<ExtractedRelation>,
    index: HashMap<(String, String), usize>,
    used_queries: HashSet<String>,
}

fn query_key(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Descending score; the sort is stable so ties keep insertion order
fn by_confidence(a: &ExtractedRelation, b: &ExtractedRelation) -> Ordering {
    b.confidence
        .unwrap_or(0.0)
        .total_cmp(&a.confidence.unwrap_or(0.0))
}

impl RelationSet {
    pub fn new(policy: AcceptPolicy) -> Self {
        Self {
            policy,
            entries: Vec::new(),
            index: HashMap::new(),
            used_queries: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offer one triple to the set
    pub fn insert(&mut self, mut relation: ExtractedRelation) -> Insertion {
        relation.subj = relation.subj.trim().to_string();
        relation.obj = relation.obj.trim().to_string();
        let key = (relation.subj.clone(), relation.obj.clone());

        match self.policy {
            AcceptPolicy::Threshold(threshold) => {
                let score = relation.confidence.unwrap_or(0.0);
                if score.is_nan() || score < threshold {
                    return Insertion::BelowThreshold;
                }
                match self.index.get(&key) {
                    Some(&i) => {
                        if score > self.entries[i].confidence.unwrap_or(0.0) {
                            self.entries[i] = relation;
                            Insertion::Replaced
                        } else {
                            Insertion::Duplicate
                        }
                    }
                    None => self.push(key, relation),
                }
            }
            AcceptPolicy::FirstSeen => {
                if self.index.contains_key(&key) {
                    Insertion::Duplicate
                } else {
                    self.push(key, relation)
                }
            }
        }
    }

    fn push(&mut self, key: (String, String), relation: ExtractedRelation) -> Insertion {
        self.index.insert(key, self.entries.len());
        self.entries.push(relation);
        Insertion::Added
    }

    /// Record a query as issued. Returns false if it was already used.
    ///
    /// Queries compare case-insensitively with whitespace collapsed.
    pub fn mark_used(&mut self, query: &str) -> bool {
        self.used_queries.insert(query_key(query))
    }

    /// Triples in reporting order
    pub fn ranked(&self) -> Vec<&ExtractedRelation> {
        let mut ranked: Vec<&ExtractedRelation> = self.entries.iter().collect();
        if let AcceptPolicy::Threshold(_) = self.policy {
            ranked.sort_by(|a, b| by_confidence(a, b));
        }
        ranked
    }

    /// Pick the next query: the best-ranked triple whose `"subj obj"` has
    /// not been issued yet. The chosen query is marked used.
    pub fn next_query(&mut self) -> Option<String> {
        let query = self
            .ranked()
            .into_iter()
            .map(|r| format!("{} {}", r.subj, r.obj))
            .find(|q| !self.used_queries.contains(&query_key(q)))?;
        self.mark_used(&query);
        Some(query)
    }

    pub fn into_ranked(self) -> Vec<ExtractedRelation> {
        let mut entries = self.entries;
        if let AcceptPolicy::Threshold(_) = self.policy {
            entries.sort_by(by_confidence);
        }
        entries
    }
}
