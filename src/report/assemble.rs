// src/report/assemble.rs
//! Reconcile a parsed report with the run's accepted articles.
//!
//! Every reference in the output resolves to an accepted article. Cluster
//! references that do not resolve are dropped (the cluster stays); a
//! newsflash item whose reference does not resolve is dropped entirely.
//! Items that arrived without any reference are matched by headline.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::collections::HashMap;

use crate::article::{normalize_title, Article, ArticleId};
use crate::dedup::title::{is_near_duplicate, DEFAULT_TITLE_SIMILARITY};
use crate::report::{Importance, Report, Strategy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalCluster {
    pub topic: String,
    pub importance: Importance,
    pub summary: Option<String>,
    pub insight: String,
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalFlash {
    pub article: Article,
    pub headline: String,
    pub comment: String,
}

/// Renderer-facing report. All article references are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalReport {
    pub market_overview: String,
    pub clusters: Vec<FinalCluster>,
    pub newsflash: Vec<FinalFlash>,
    pub strategy: Strategy,
    /// References that pointed outside the accepted set.
    pub dropped_refs: usize,
    /// Newsflash items without a reference whose headline matched nothing.
    pub unresolved_items: usize,
    pub generated_at: DateTime<Utc>,
}

impl FinalReport {
    pub fn article_count(&self) -> usize {
        let mut ids: Vec<&ArticleId> = self
            .clusters
            .iter()
            .flat_map(|c| c.articles.iter().map(|a| &a.id))
            .chain(self.newsflash.iter().map(|f| &f.article.id))
            .collect();
        ids.sort();
        ids.dedup();
        ids.len()
    }
}

struct Lookup<'a> {
    by_id: HashMap<&'a ArticleId, &'a Article>,
    by_title: HashMap<&'a str, &'a Article>,
    accepted: &'a [Article],
}

impl<'a> Lookup<'a> {
    fn new(accepted: &'a [Article]) -> Self {
        let mut by_id = HashMap::with_capacity(accepted.len());
        let mut by_title = HashMap::with_capacity(accepted.len());
        for a in accepted {
            by_id.entry(&a.id).or_insert(a);
            if !a.normalized_title().is_empty() {
                by_title.entry(a.normalized_title()).or_insert(a);
            }
        }
        Self {
            by_id,
            by_title,
            accepted,
        }
    }

    fn by_id(&self, id: &ArticleId) -> Option<&'a Article> {
        self.by_id.get(id).copied()
    }

    fn by_headline(&self, headline: &str) -> Option<&'a Article> {
        let norm = normalize_title(headline);
        if norm.is_empty() {
            return None;
        }
        if let Some(a) = self.by_title.get(norm.as_str()).copied() {
            return Some(a);
        }
        self.accepted
            .iter()
            .find(|a| is_near_duplicate(&norm, a.normalized_title(), DEFAULT_TITLE_SIMILARITY))
    }
}

/// Build the final report. Pure: no index access, no I/O.
pub fn assemble(parsed: Report, accepted: &[Article]) -> FinalReport {
    assemble_at(parsed, accepted, Utc::now())
}

pub fn assemble_at(parsed: Report, accepted: &[Article], now: DateTime<Utc>) -> FinalReport {
    let lookup = Lookup::new(accepted);
    let mut dropped_refs = 0usize;
    let mut unresolved_items = 0usize;

    let clusters = parsed
        .clusters
        .into_iter()
        .map(|c| {
            let mut articles = Vec::with_capacity(c.article_refs.len());
            for id in &c.article_refs {
                match lookup.by_id(id) {
                    Some(a) => articles.push(a.clone()),
                    None => {
                        dropped_refs += 1;
                        tracing::debug!(target: "report", %id, topic = %c.topic, "dangling cluster ref dropped");
                    }
                }
            }
            FinalCluster {
                topic: c.topic,
                importance: c.importance,
                summary: c.summary,
                insight: c.insight,
                articles,
            }
        })
        .collect();

    let mut newsflash = Vec::with_capacity(parsed.newsflash.len());
    for item in parsed.newsflash {
        let article = match &item.article_ref {
            Some(id) => match lookup.by_id(id) {
                Some(a) => a,
                None => {
                    dropped_refs += 1;
                    tracing::debug!(target: "report", %id, "dangling newsflash item dropped");
                    continue;
                }
            },
            None => match item.headline.as_deref().and_then(|h| lookup.by_headline(h)) {
                Some(a) => a,
                None => {
                    unresolved_items += 1;
                    continue;
                }
            },
        };
        newsflash.push(FinalFlash {
            headline: item.headline.unwrap_or_else(|| article.title.clone()),
            article: article.clone(),
            comment: item.comment,
        });
    }

    if dropped_refs > 0 {
        counter!("report_dangling_refs_total").increment(dropped_refs as u64);
    }
    tracing::info!(
        target: "report",
        strategy = %parsed.strategy,
        accepted = accepted.len(),
        dropped_refs,
        unresolved_items,
        "report assembled"
    );

    FinalReport {
        market_overview: parsed.market_overview,
        clusters,
        newsflash,
        strategy: parsed.strategy,
        dropped_refs,
        unresolved_items,
        generated_at: now,
    }
}
