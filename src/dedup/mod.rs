// src/dedup/mod.rs
//! Duplicate elimination: URL → normalized title → content hash cascade.
//!
//! Stages run in fixed order and the first match wins. A stage whose
//! signature cannot be computed (empty URL, title without word characters,
//! empty body) is skipped rather than treated as a match. Accepted articles
//! have all their signatures registered before the next evaluation, so
//! within-batch duplicates are caught against the first occurrence.

pub mod actor;
pub mod index;
pub mod title;
pub mod url;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Serialize;

use crate::article::Article;
use crate::dedup::index::{Signature, SignatureStore};
use crate::dedup::url::UrlPolicy;

pub use crate::dedup::actor::{spawn_dedup_actor, DedupHandle, Evaluated};
pub use crate::dedup::index::{FileIndex, MemoryIndex};

/// Cascade stage that matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Url,
    Title,
    Content,
}

impl Stage {
    pub fn reason(self) -> &'static str {
        match self {
            Stage::Url => "duplicate-url",
            Stage::Title => "duplicate-title",
            Stage::Content => "duplicate-content",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Url => "url",
            Stage::Title => "title",
            Stage::Content => "content",
        }
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected {
        stage: Stage,
        /// Stored signature the article collided with.
        matched: String,
    },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// `duplicate-url` / `duplicate-title` / `duplicate-content`, or `None`.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Verdict::Accepted => None,
            Verdict::Rejected { stage, .. } => Some(stage.reason()),
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Verdict::Accepted => None,
            Verdict::Rejected { stage, .. } => Some(*stage),
        }
    }
}

/// Tunables of the cascade.
#[derive(Debug, Clone)]
pub struct DedupPolicy {
    pub urls: UrlPolicy,
    /// URL and content-hash entries older than this are ignored.
    pub horizon: Duration,
    /// Titles are only compared against titles accepted within this window.
    pub title_window: Duration,
    /// Normalized Levenshtein similarity at or above which titles collide.
    pub title_similarity: f64,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            urls: UrlPolicy::default(),
            horizon: Duration::days(30),
            title_window: Duration::days(3),
            title_similarity: title::DEFAULT_TITLE_SIMILARITY,
        }
    }
}

/// Per-stage rejection tally for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RejectCounts {
    pub url: usize,
    pub title: usize,
    pub content: usize,
}

impl RejectCounts {
    pub fn record(&mut self, stage: Stage) {
        match stage {
            Stage::Url => self.url += 1,
            Stage::Title => self.title += 1,
            Stage::Content => self.content += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.url + self.title + self.content
    }

    pub fn merge(&mut self, other: RejectCounts) {
        self.url += other.url;
        self.title += other.title;
        self.content += other.content;
    }
}

/// Cascade evaluator owning its signature store.
#[derive(Debug)]
pub struct Deduplicator<S: SignatureStore> {
    store: S,
    policy: DedupPolicy,
}

impl<S: SignatureStore> Deduplicator<S> {
    pub fn new(store: S, policy: DedupPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &DedupPolicy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Check the article against the index and, if it is new, register it.
    pub fn evaluate(&mut self, article: &Article, now: DateTime<Utc>) -> Verdict {
        let verdict = self.check(article, now);
        match &verdict {
            Verdict::Accepted => {
                self.register(article, now);
                counter!("dedup_accepted_total").increment(1);
                tracing::trace!(target: "dedup", id = %article.id, "accepted");
            }
            Verdict::Rejected { stage, .. } => {
                counter!("dedup_rejected_total", "stage" => stage.as_str()).increment(1);
                tracing::debug!(
                    target: "dedup",
                    id = %article.id,
                    source = %article.source,
                    reason = stage.reason(),
                    "rejected"
                );
            }
        }
        verdict
    }

    /// Evaluate a batch in order. Returns the accepted subset and rejection tally.
    pub fn deduplicate(
        &mut self,
        articles: Vec<Article>,
        now: DateTime<Utc>,
    ) -> (Vec<Article>, RejectCounts) {
        let input = articles.len();
        let mut kept = Vec::with_capacity(input);
        let mut rejected = RejectCounts::default();
        for article in articles {
            match self.evaluate(&article, now) {
                Verdict::Accepted => kept.push(article),
                Verdict::Rejected { stage, .. } => rejected.record(stage),
            }
        }
        tracing::info!(
            target: "dedup",
            input,
            kept = kept.len(),
            dup_url = rejected.url,
            dup_title = rejected.title,
            dup_content = rejected.content,
            "batch deduplicated"
        );
        (kept, rejected)
    }

    /// Drop index entries that fell out of the horizon.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        self.store.prune(now - self.policy.horizon)
    }

    fn check(&self, article: &Article, now: DateTime<Utc>) -> Verdict {
        let horizon = now - self.policy.horizon;

        // 1) URL
        if let Some(url) = self.policy.urls.normalize(&article.url) {
            if self.store.contains_url(&url, horizon) {
                return Verdict::Rejected {
                    stage: Stage::Url,
                    matched: url,
                };
            }
        }

        // 2) Title (empty signatures never disambiguate)
        let title = article.normalized_title();
        if !title.is_empty() {
            let since = now - self.policy.title_window;
            if let Some(matched) =
                self.store
                    .similar_title(title, since, self.policy.title_similarity)
            {
                return Verdict::Rejected {
                    stage: Stage::Title,
                    matched,
                };
            }
        }

        // 3) Content hash
        if let Some(hash) = article.content_hash() {
            if self.store.contains_hash(hash, horizon) {
                return Verdict::Rejected {
                    stage: Stage::Content,
                    matched: hash.to_string(),
                };
            }
        }

        Verdict::Accepted
    }

    fn register(&mut self, article: &Article, now: DateTime<Utc>) {
        if let Some(url) = self.policy.urls.normalize(&article.url) {
            self.store.register(Signature::Url(url), now);
        }
        let title = article.normalized_title();
        if !title.is_empty() {
            self.store.register(Signature::Title(title.to_string()), now);
        }
        if let Some(hash) = article.content_hash() {
            self.store.register(Signature::Hash(hash.to_string()), now);
        }
    }
}
