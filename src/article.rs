// src/article.rs
//! Article record shared by ingest, dedup and report assembly.
//!
//! Derived signatures (normalized title, content hash, article id) are computed
//! once at construction so every stage sees the same values.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Short, stable identifier exposed to the model and echoed back in reports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL when present; otherwise title, source, body hash and publish time,
    /// so URL-less items with the same headline stay distinguishable.
    fn derive(
        url: &str,
        title: &str,
        source: &str,
        content_hash: Option<&str>,
        published_at: DateTime<Utc>,
    ) -> Self {
        let key = if url.trim().is_empty() {
            format!(
                "{title}|{source}|{}|{}",
                content_hash.unwrap_or_default(),
                published_at.timestamp()
            )
        } else {
            url.trim().to_string()
        };
        Self(short_digest(&key, 6))
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArticleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Raw record as delivered by a source provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawArticle {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Fixed-shape article with derived dedup signatures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub id: ArticleId,
    pub url: String,
    pub title: String,
    /// May be empty when the source only publishes headlines.
    pub body: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub category: Option<String>,
    normalized_title: String,
    content_hash: Option<String>,
}

impl Article {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        source: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self::from_raw(RawArticle {
            url: url.into(),
            title: title.into(),
            body: body.into(),
            source: source.into(),
            published_at,
            category: None,
        })
    }

    /// Cleans title/body text and computes the derived signatures.
    pub fn from_raw(raw: RawArticle) -> Self {
        let title = normalize_text(&raw.title);
        let body = normalize_text(&raw.body);
        let url = raw.url.trim().to_string();
        let normalized_title = normalize_title(&title);
        let content_hash = content_hash(&body);
        let id = ArticleId::derive(
            &url,
            &title,
            &raw.source,
            content_hash.as_deref(),
            raw.published_at,
        );
        Self {
            id,
            url,
            title,
            body,
            source: raw.source.trim().to_string(),
            published_at: raw.published_at,
            category: raw.category.filter(|c| !c.trim().is_empty()),
            normalized_title,
            content_hash,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Empty when the title has no word characters.
    pub fn normalized_title(&self) -> &str {
        &self.normalized_title
    }

    /// `None` for an empty body.
    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

/// Decode entities, strip tags, fold typographic quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    re_ws().replace_all(&out, " ").trim().to_string()
}

/// Case-fold, drop punctuation, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    static RE_PUNCT: OnceCell<Regex> = OnceCell::new();
    let re_punct = RE_PUNCT.get_or_init(|| Regex::new(r"[^\w\s]").expect("punct regex"));
    let lower = title.to_lowercase();
    let stripped = re_punct.replace_all(&lower, "");
    re_ws().replace_all(&stripped, " ").trim().to_string()
}

/// SHA-256 hex digest of the lower-cased, whitespace-collapsed body.
pub fn content_hash(body: &str) -> Option<String> {
    let collapsed = re_ws().replace_all(body.trim(), " ").to_lowercase();
    if collapsed.is_empty() {
        return None;
    }
    Some(short_digest(&collapsed, 32))
}

/// Hex of the first `bytes` bytes of a SHA-256 digest.
pub(crate) fn short_digest(text: &str, bytes: usize) -> String {
    use std::fmt::Write as _;
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(bytes * 2);
    for b in digest.iter().take(bytes) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
