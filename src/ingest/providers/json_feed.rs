// src/ingest/providers/json_feed.rs
//! Provider for collectors that hand over a JSON array of raw articles,
//! either as a file on disk or over HTTP.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use std::path::PathBuf;

use crate::article::RawArticle;
use crate::ingest::types::SourceProvider;

pub struct JsonFeedProvider {
    name: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    File(PathBuf),
    Http { url: String, client: reqwest::Client },
}

impl JsonFeedProvider {
    pub fn from_fixture_str(name: impl Into<String>, s: &str) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            mode: Mode::File(path.into()),
        }
    }

    pub fn from_url(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Http {
                url: url.into(),
                client: reqwest::Client::new(),
            },
        }
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<RawArticle>> {
        let t0 = std::time::Instant::now();
        let mut items: Vec<RawArticle> = serde_json::from_str(s)
            .with_context(|| format!("parsing json feed {}", self.name))?;
        // Records with neither a title nor a URL carry nothing the cascade can use.
        items.retain(|it| !it.title.trim().is_empty() || !it.url.trim().is_empty());

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_events_total").increment(items.len() as u64);
        Ok(items)
    }
}

#[async_trait]
impl SourceProvider for JsonFeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawArticle>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::File(path) => {
                let body = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading feed {}", path.display()))?;
                self.parse_items_from_str(&body)
            }
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("{} http get()", self.name))?
                    .text()
                    .await
                    .with_context(|| format!("{} http .text()", self.name))?;
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"[
        {"url": "https://a.test/1", "title": "Banks lift rates", "body": "b", "source": "Wire",
         "published_at": "2026-01-22T08:00:00Z", "category": "banking"},
        {"url": "", "title": "  ", "source": "Wire", "published_at": "2026-01-22T08:00:00Z"}
    ]"#;

    #[tokio::test]
    async fn fixture_feed_parses_and_skips_blank_records() {
        let p = JsonFeedProvider::from_fixture_str("wire", FEED);
        let items = p.fetch_latest().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].category.as_deref(), Some("banking"));
    }

    #[tokio::test]
    async fn untitled_record_with_url_is_kept() {
        let feed = r#"[
            {"url": "https://a.test/2", "title": "", "body": "b", "source": "Wire",
             "published_at": "2026-01-22T08:00:00Z"}
        ]"#;
        let p = JsonFeedProvider::from_fixture_str("wire", feed);
        let items = p.fetch_latest().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://a.test/2");
    }

    #[tokio::test]
    async fn file_feed_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, FEED).unwrap();
        let p = JsonFeedProvider::from_file("wire", &path);
        assert_eq!(p.fetch_latest().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_feed_is_an_error() {
        let p = JsonFeedProvider::from_fixture_str("wire", "{not json");
        assert!(p.fetch_latest().await.is_err());
    }
}
