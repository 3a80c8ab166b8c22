use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::fetcher::{fetch_one, FeedReader, FeedSource};
use super::normalize::{Article, NormalizePolicy};

/// Default pause between two consecutive source fetches.
pub const DEFAULT_COURTESY_DELAY: Duration = Duration::from_millis(300);

/// Per-source summary of one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub url: String,
    pub accepted: usize,
    pub rejected: usize,
    pub error: Option<String>,
}

/// Summary of one aggregation run, kept next to the cached articles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    pub sources: Vec<SourceReport>,
    /// Articles dropped because an earlier source already had the same url
    pub duplicates: usize,
    /// Articles in the final list
    pub total: usize,
    pub finished_at: DateTime<Utc>,
}

impl AggregateReport {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }
}

/// Result of [`Aggregator::aggregate`].
#[derive(Debug, Clone)]
pub struct Aggregated {
    pub articles: Vec<Article>,
    pub report: AggregateReport,
}

/// Runs the fetcher over every configured source and merges the results.
///
/// Sources are fetched one at a time, in configuration order, with
/// `courtesy_delay` between them so the upstream never sees a burst.
pub struct Aggregator<R> {
    reader: R,
    sources: Arc<[FeedSource]>,
    policy: NormalizePolicy,
    courtesy_delay: Duration,
}

impl<R: FeedReader> Aggregator<R> {
    pub fn new(reader: R, sources: Vec<FeedSource>, policy: NormalizePolicy) -> Self {
        Self {
            reader,
            sources: sources.into(),
            policy,
            courtesy_delay: DEFAULT_COURTESY_DELAY,
        }
    }

    pub fn with_courtesy_delay(mut self, delay: Duration) -> Self {
        self.courtesy_delay = delay;
        self
    }

    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }

    /// Fetch all sources and return one deduplicated, newest-first list.
    ///
    /// Never fails. Sources that error out contribute nothing; if all of them
    /// do, the list is empty.
    pub async fn aggregate(&self) -> Aggregated {
        tracing::info!(sources = self.sources.len(), "Fetching articles from feeds");

        let mut batches = Vec::with_capacity(self.sources.len());
        let mut reports = Vec::with_capacity(self.sources.len());

        for (i, source) in self.sources.iter().enumerate() {
            if i > 0 && !self.courtesy_delay.is_zero() {
                tokio::time::sleep(self.courtesy_delay).await;
            }

            let outcome = fetch_one(&self.reader, source, &self.policy).await;
            reports.push(SourceReport {
                url: outcome.source.to_string(),
                accepted: outcome.articles.len(),
                rejected: outcome.rejected,
                error: outcome.error.as_ref().map(|e| e.to_string()),
            });
            batches.push(outcome.articles);
        }

        let (articles, duplicates) = merge_articles(batches);
        let report = AggregateReport {
            sources: reports,
            duplicates,
            total: articles.len(),
            finished_at: Utc::now(),
        };

        if report.failed_sources() == self.sources.len() && !self.sources.is_empty() {
            tracing::error!(
                sources = self.sources.len(),
                "Every feed failed, aggregation is empty"
            );
        }
        tracing::info!(
            total = report.total,
            duplicates = report.duplicates,
            failed = report.failed_sources(),
            "Successfully fetched unique articles"
        );

        Aggregated { articles, report }
    }
}

/// Merge per-source batches into one list.
///
/// Keeps the first occurrence of every url (batch order, then position in
/// the batch) and sorts newest first. The sort is stable, so articles with
/// equal timestamps stay in fetch order. Returns the list and the number of
/// duplicates dropped.
pub fn merge_articles(batches: Vec<Vec<Article>>) -> (Vec<Article>, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut duplicates = 0;

    let mut merged: Vec<Article> = batches
        .into_iter()
        .flatten()
        .filter(|article| {
            let fresh = seen.insert(article.url().to_string());
            if !fresh {
                duplicates += 1;
            }
            fresh
        })
        .collect();

    merged.sort_by(|a, b| b.published_at().cmp(&a.published_at()));
    (merged, duplicates)
}
