//! Iterative set expansion loop
//!
//! Starting from a seed query, repeatedly: search, fetch each unseen page,
//! extract triples for the target relation, and fold them into the
//! accumulated set. The next query is built from the best triple not yet
//! used as a query. The loop stops once `k` triples are held, when no
//! unused triple is left, or after the iteration limit.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use ise_core::{ExtractedRelation, PageFetcher, Result, WebSearch};
use ise_extractor::Extractor;

use crate::accumulator::{AcceptPolicy, Insertion, RelationSet};

/// Loop parameters
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Requested number of triples
    pub k: usize,
    /// Search results fetched per query
    pub results_per_query: usize,
    pub max_iterations: usize,
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// At least `k` triples were found
    Reached,
    /// Every accumulated triple has already been used as a query
    Stalled,
    IterationLimit,
}

/// Per-iteration counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct IterationStats {
    pub query: String,
    pub hits: usize,
    pub pages: usize,
    pub skipped: usize,
    pub extracted: usize,
    pub added: usize,
}

/// Final outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub relation: String,
    pub strategy: &'static str,
    pub stop: StopReason,
    pub iterations: Vec<IterationStats>,
    pub relations: Vec<ExtractedRelation>,
}

/// URL key used for seen-page tracking; fragments never change the page
fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.trim().to_string(),
    }
}

/// Drives search, fetching and extraction for one run
pub struct Driver {
    search: Arc<dyn WebSearch>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Extractor,
    params: RunParams,
    seen_urls: HashSet<String>,
}

impl Driver {
    pub fn new(
        search: Arc<dyn WebSearch>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Extractor,
        params: RunParams,
    ) -> Self {
        Self {
            search,
            fetcher,
            extractor,
            params,
            seen_urls: HashSet::new(),
        }
    }

    /// Run the loop from `seed_query`.
    ///
    /// `threshold` applies to the span-pair strategy only; prompted
    /// completions carry no score and are accepted as found.
    pub async fn run(&mut self, seed_query: &str, threshold: f32) -> Result<RunSummary> {
        let policy = if self.extractor.is_scored() {
            AcceptPolicy::Threshold(threshold)
        } else {
            AcceptPolicy::FirstSeen
        };
        let mut set = RelationSet::new(policy);
        let mut iterations = Vec::new();

        let mut query = seed_query.trim().to_string();
        set.mark_used(&query);

        let stop = loop {
            info!(
                iteration = iterations.len() + 1,
                query = %query,
                "Starting iteration"
            );
            let stats = self.iterate(&query, &mut set).await?;
            info!(
                iteration = iterations.len() + 1,
                pages = stats.pages,
                extracted = stats.extracted,
                added = stats.added,
                total = set.len(),
                "Iteration finished"
            );
            iterations.push(stats);

            if set.len() >= self.params.k {
                break StopReason::Reached;
            }
            if iterations.len() >= self.params.max_iterations {
                warn!(
                    max_iterations = self.params.max_iterations,
                    "Iteration limit reached"
                );
                break StopReason::IterationLimit;
            }
            match set.next_query() {
                Some(next) => query = next,
                None => {
                    warn!(found = set.len(), k = self.params.k, "No unused triple left to query");
                    break StopReason::Stalled;
                }
            }
        };

        Ok(RunSummary {
            relation: self.extractor.spec().name.clone(),
            strategy: self.extractor.strategy(),
            stop,
            iterations,
            relations: set.into_ranked(),
        })
    }

    async fn iterate(&mut self, query: &str, set: &mut RelationSet) -> Result<IterationStats> {
        let hits = self
            .search
            .search(query, self.params.results_per_query)
            .await?;

        let mut stats = IterationStats {
            query: query.to_string(),
            hits: hits.len(),
            ..Default::default()
        };

        for (i, hit) in hits.iter().enumerate() {
            if !self.seen_urls.insert(normalize_url(&hit.url)) {
                debug!(url = %hit.url, "Already seen, skipping");
                continue;
            }

            info!(
                url = %hit.url,
                "Processing result {}/{}",
                i + 1,
                hits.len()
            );

            let text = match self.fetcher.fetch_text(&hit.url).await {
                Ok(Some(text)) => text,
                Ok(None) => {
                    debug!(url = %hit.url, "No text on page");
                    stats.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(url = %hit.url, error = %e, "Failed to fetch page, skipping");
                    stats.skipped += 1;
                    continue;
                }
            };
            stats.pages += 1;

            let relations = self.extractor.extract(&text).await?;
            stats.extracted += relations.len();

            for relation in relations {
                match set.insert(relation) {
                    Insertion::Added | Insertion::Replaced => stats.added += 1,
                    Insertion::Duplicate => debug!("Duplicate triple ignored"),
                    Insertion::BelowThreshold => debug!("Triple below threshold ignored"),
                }
            }
        }

        Ok(stats)
    }
}
