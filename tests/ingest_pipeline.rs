// tests/ingest_pipeline.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use news_digest::dedup::{spawn_dedup_actor, DedupPolicy, Deduplicator, MemoryIndex};
use news_digest::ingest::run_once;
use news_digest::ingest::types::SourceProvider;
use news_digest::RawArticle;

struct MockProvider {
    name: &'static str,
    items: Vec<(&'static str, &'static str)>,
}

#[async_trait]
impl SourceProvider for MockProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawArticle>> {
        let ts = Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap();
        Ok(self
            .items
            .iter()
            .map(|(url, title)| RawArticle {
                url: url.to_string(),
                title: title.to_string(),
                body: "<p>Shared&nbsp;wire <b>copy</b></p>".to_string(),
                source: self.name.to_string(),
                published_at: ts,
                category: None,
            })
            .collect())
    }
    fn name(&self) -> &str {
        self.name
    }
}

#[tokio::test]
async fn providers_are_merged_in_provider_order() {
    let providers: Vec<Box<dyn SourceProvider>> = vec![
        Box::new(MockProvider {
            name: "alpha",
            items: vec![("https://alpha.test/1", "Alpha first story")],
        }),
        Box::new(MockProvider {
            name: "beta",
            items: vec![("https://beta.test/1", "Beta only story")],
        }),
    ];
    let dedup = Deduplicator::new(MemoryIndex::new(), DedupPolicy::default());
    let (handle, join) = spawn_dedup_actor(dedup, 16, Utc::now());
    let out = run_once(&providers, &handle).await;
    drop(handle);
    join.await.unwrap();

    // Same cleaned body: the second provider's item is a content duplicate.
    assert_eq!(out.fetched, 2);
    assert_eq!(out.accepted.len(), 1);
    assert_eq!(out.rejected.content, 1);
}

#[tokio::test]
async fn article_text_is_cleaned_on_the_way_in() {
    let providers: Vec<Box<dyn SourceProvider>> = vec![Box::new(MockProvider {
        name: "alpha",
        items: vec![("  https://alpha.test/2  ", "  Markets &amp; <i>more</i>  ")],
    })];
    let dedup = Deduplicator::new(MemoryIndex::new(), DedupPolicy::default());
    let (handle, join) = spawn_dedup_actor(dedup, 16, Utc::now());
    let out = run_once(&providers, &handle).await;
    drop(handle);
    join.await.unwrap();

    let a = &out.accepted[0];
    assert_eq!(a.url, "https://alpha.test/2");
    assert_eq!(a.title, "Markets & more");
    assert_eq!(a.body, "Shared wire copy");
    assert_eq!(a.source, "alpha");
}
