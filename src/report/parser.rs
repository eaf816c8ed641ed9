// src/report/parser.rs
//! Model output → `Report`, via an ordered chain of strategies.
//!
//! strict → repaired → extracted → empty. Each strategy either yields a
//! structurally valid report or hands over to the next; the chain itself
//! never fails.

use metrics::counter;
use serde::Deserialize;
use std::collections::BTreeSet;

use crate::article::ArticleId;
use crate::report::extract::{extract, Extracted};
use crate::report::repair;
use crate::report::{clean_field, Cluster, Importance, NewsFlash, Report, Strategy, UNAVAILABLE};

// ------------------------------------------------------------
// Wire schema (strict)
// ------------------------------------------------------------

/// Article reference as models emit it: a number or a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireRef {
    Int(i64),
    Float(f64),
    Str(String),
}

impl WireRef {
    fn into_id(self) -> Option<ArticleId> {
        let s = match self {
            WireRef::Int(n) => n.to_string(),
            WireRef::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{}", f as i64),
            WireRef::Float(f) => f.to_string(),
            WireRef::Str(s) => s.trim().to_string(),
        };
        if s.is_empty() {
            None
        } else {
            Some(ArticleId::new(s))
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireReport {
    #[serde(
        rename = "marketOverview",
        alias = "market_overview",
        alias = "market_sentiment",
        alias = "marketSentiment"
    )]
    market_overview: String,
    #[serde(alias = "themes")]
    clusters: Vec<WireCluster>,
    #[serde(alias = "news_flash", alias = "newsFlash")]
    newsflash: Vec<WireFlash>,
}

#[derive(Debug, Deserialize)]
struct WireCluster {
    #[serde(default, alias = "title", alias = "theme")]
    topic: Option<String>,
    #[serde(
        default,
        rename = "importanceTag",
        alias = "importance_tag",
        alias = "importance"
    )]
    importance: Option<String>,
    #[serde(
        default,
        rename = "articleRefs",
        alias = "article_refs",
        alias = "related_article_ids",
        alias = "articleIds"
    )]
    article_refs: Option<Vec<WireRef>>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    insight: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireFlash {
    #[serde(
        default,
        rename = "articleRef",
        alias = "article_ref",
        alias = "articleId",
        alias = "id"
    )]
    article_ref: Option<WireRef>,
    #[serde(default, alias = "title")]
    headline: Option<String>,
    #[serde(
        default,
        rename = "oneLineComment",
        alias = "one_line_comment",
        alias = "one_sentence_comment",
        alias = "comment"
    )]
    comment: Option<String>,
}

fn convert_cluster(w: WireCluster) -> Option<Cluster> {
    let topic = w.topic.as_deref().and_then(clean_field).unwrap_or_default();
    let insight = w.insight.as_deref().and_then(clean_field).unwrap_or_default();
    if topic.is_empty() && insight.is_empty() {
        return None;
    }
    let article_refs: BTreeSet<ArticleId> = w
        .article_refs
        .unwrap_or_default()
        .into_iter()
        .filter_map(WireRef::into_id)
        .collect();
    Some(Cluster {
        topic,
        importance: w
            .importance
            .as_deref()
            .map(Importance::parse_tag)
            .unwrap_or_default(),
        article_refs,
        summary: w.summary.as_deref().and_then(clean_field),
        insight,
    })
}

fn convert_flash(w: WireFlash) -> Option<NewsFlash> {
    let comment = w.comment.as_deref().and_then(clean_field)?;
    Some(NewsFlash {
        article_ref: w.article_ref.and_then(WireRef::into_id),
        headline: w.headline.as_deref().and_then(clean_field),
        comment,
    })
}

/// Strict strategy: the whole text must be a report-shaped JSON object.
fn parse_strict(text: &str) -> Option<Report> {
    let wire: WireReport = serde_json::from_str(text.trim()).ok()?;
    Some(Report {
        market_overview: clean_field(&wire.market_overview)
            .unwrap_or_else(|| UNAVAILABLE.to_string()),
        clusters: wire.clusters.into_iter().filter_map(convert_cluster).collect(),
        newsflash: wire.newsflash.into_iter().filter_map(convert_flash).collect(),
        strategy: Strategy::Strict,
    })
}

fn from_extracted(ex: Extracted) -> Report {
    Report {
        market_overview: ex.overview.unwrap_or_else(|| UNAVAILABLE.to_string()),
        clusters: ex.clusters,
        newsflash: ex.newsflash,
        strategy: Strategy::Extracted,
    }
}

fn run_chain(raw: &str) -> Report {
    if raw.trim().is_empty() {
        return Report::empty();
    }

    if let Some(report) = parse_strict(raw) {
        return report;
    }

    for candidate in repair::candidates(raw) {
        if let Some(mut report) = parse_strict(&candidate) {
            report.strategy = Strategy::Repaired;
            return report;
        }
    }

    let ex = extract(raw);
    if ex.is_empty() {
        Report::empty()
    } else {
        from_extracted(ex)
    }
}

/// Parse raw model text. Never fails; the worst case is `Report::empty()`.
pub fn parse(raw: &str) -> Report {
    let report = run_chain(raw);
    counter!("report_strategy_total", "strategy" => report.strategy.as_str()).increment(1);
    tracing::info!(
        target: "report",
        strategy = %report.strategy,
        raw_len = raw.len(),
        overview = report.has_overview(),
        clusters = report.clusters.len(),
        newsflash = report.newsflash.len(),
        "model response parsed"
    );
    report
}
