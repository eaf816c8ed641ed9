// src/report/mod.rs
//! Digest report model plus the parse → assemble pipeline that produces it.
//!
//! `parser::parse` turns raw model text into a `Report` without ever failing;
//! `assemble::assemble` cross-checks the report's article references against
//! the run's accepted articles and yields the `FinalReport` handed to
//! renderers.

pub mod assemble;
pub mod extract;
pub mod parser;
pub mod repair;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::article::ArticleId;

pub use crate::report::assemble::{assemble, assemble_at, FinalCluster, FinalFlash, FinalReport};
pub use crate::report::parser::parse;

/// Overview sentinel when no strategy could recover it.
pub const UNAVAILABLE: &str = "unavailable";

/// Which parser strategy produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Strict,
    Repaired,
    Extracted,
    Empty,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Strict => "strict",
            Strategy::Repaired => "repaired",
            Strategy::Extracted => "extracted",
            Strategy::Empty => "empty",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Importance tag attached to a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    Medium,
    Low,
    #[default]
    Unspecified,
}

impl Importance {
    /// Lenient tag parsing: `high`/`H`/`高`, `medium`/`mid`/`中`, `low`/`低`.
    pub fn parse_tag(s: &str) -> Self {
        let t = s.trim().trim_matches(|c: char| c == '*' || c == '"').to_lowercase();
        match t.as_str() {
            "high" | "h" | "高" | "critical" | "major" => Importance::High,
            "medium" | "mid" | "m" | "中" | "moderate" | "normal" => Importance::Medium,
            "low" | "l" | "低" | "minor" => Importance::Low,
            _ => Importance::Unspecified,
        }
    }
}

/// Topic cluster as recovered from the model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub topic: String,
    pub importance: Importance,
    pub article_refs: BTreeSet<ArticleId>,
    pub summary: Option<String>,
    pub insight: String,
}

/// One-line item; `article_ref` may be missing when recovered by extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsFlash {
    pub article_ref: Option<ArticleId>,
    pub headline: Option<String>,
    pub comment: String,
}

/// Parsed report before reference reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub market_overview: String,
    pub clusters: Vec<Cluster>,
    pub newsflash: Vec<NewsFlash>,
    pub strategy: Strategy,
}

impl Report {
    /// All-sentinel report.
    pub fn empty() -> Self {
        Self {
            market_overview: UNAVAILABLE.to_string(),
            clusters: Vec::new(),
            newsflash: Vec::new(),
            strategy: Strategy::Empty,
        }
    }

    pub fn has_overview(&self) -> bool {
        self.market_overview != UNAVAILABLE
    }

    /// Every article reference mentioned anywhere in the report.
    pub fn referenced_ids(&self) -> BTreeSet<ArticleId> {
        let mut out: BTreeSet<ArticleId> = self
            .clusters
            .iter()
            .flat_map(|c| c.article_refs.iter().cloned())
            .collect();
        out.extend(self.newsflash.iter().filter_map(|f| f.article_ref.clone()));
        out
    }
}

/// Trims and collapses whitespace; `None` if nothing is left.
pub(crate) fn clean_field(s: &str) -> Option<String> {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_tags_are_lenient() {
        assert_eq!(Importance::parse_tag("HIGH"), Importance::High);
        assert_eq!(Importance::parse_tag(" 中 "), Importance::Medium);
        assert_eq!(Importance::parse_tag("**low**"), Importance::Low);
        assert_eq!(Importance::parse_tag("???"), Importance::Unspecified);
    }

    #[test]
    fn empty_report_uses_sentinels() {
        let r = Report::empty();
        assert_eq!(r.market_overview, UNAVAILABLE);
        assert!(r.clusters.is_empty());
        assert!(r.newsflash.is_empty());
        assert_eq!(r.strategy, Strategy::Empty);
        assert!(!r.has_overview());
    }
}
