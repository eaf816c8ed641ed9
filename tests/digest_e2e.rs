// tests/digest_e2e.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use news_digest::analyze::{MockProvider, ModelClient, ModelError, Prompt};
use news_digest::analyze::ai_adapter::ModelFuture;
use news_digest::dedup::{FileIndex, MemoryIndex};
use news_digest::ingest::providers::{JsonFeedProvider, StaticProvider};
use news_digest::ingest::types::SourceProvider;
use news_digest::report::UNAVAILABLE;
use news_digest::{run_digest, DigestEngine, RunOptions, Strategy};

const WIRE: &str = include_str!("fixtures/feed_wire.json");
const DESK: &str = include_str!("fixtures/feed_desk.json");

fn providers() -> Vec<Box<dyn SourceProvider>> {
    vec![
        Box::new(JsonFeedProvider::from_fixture_str("wire", WIRE)),
        Box::new(JsonFeedProvider::from_fixture_str("desk", DESK)),
    ]
}

/// Never answers within any sane timeout.
struct Stalled;

impl ModelClient for Stalled {
    fn complete<'a>(&'a self, _prompt: &'a Prompt) -> ModelFuture<'a> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ModelError::Status(504))
        })
    }
    fn provider_name(&self) -> &'static str {
        "stalled"
    }
}

#[tokio::test]
async fn fixture_feeds_dedup_across_sources() {
    let model = MockProvider::new();
    let run = run_digest(MemoryIndex::new(), &providers(), &model, &RunOptions::default(), Utc::now())
        .await
        .unwrap();

    assert_eq!(run.fetched, 6);
    assert_eq!(run.accepted.len(), 4);
    assert_eq!(run.rejected.title, 1);
    assert_eq!(run.rejected.content, 1);
    assert_eq!(run.provider_errors, 0);
    assert_eq!(model.calls(), 1);

    assert_eq!(run.report.strategy, Strategy::Strict);
    assert_eq!(run.report.clusters.len(), 4);
    assert_eq!(run.report.dropped_refs, 0);
    assert_eq!(run.report.article_count(), 4);
}

#[tokio::test]
async fn second_run_over_same_feeds_finds_nothing_new() {
    let model = MockProvider::new();
    let opts = RunOptions::default();
    let first = run_digest(MemoryIndex::new(), &providers(), &model, &opts, Utc::now())
        .await
        .unwrap();
    let second = run_digest(first.store, &providers(), &model, &opts, Utc::now())
        .await
        .unwrap();

    assert!(second.accepted.is_empty());
    assert_eq!(second.rejected.total(), 6);
    assert_eq!(model.calls(), 1);
    assert_eq!(second.report.strategy, Strategy::Empty);
    assert_eq!(second.report.market_overview, UNAVAILABLE);
}

#[tokio::test]
async fn file_index_carries_over_between_processes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    let model = MockProvider::new();
    let opts = RunOptions::default();

    let first = run_digest(FileIndex::open(&path).unwrap(), &providers(), &model, &opts, Utc::now())
        .await
        .unwrap();
    assert!(first.index_flushed);
    drop(first);

    let second = run_digest(FileIndex::open(&path).unwrap(), &providers(), &model, &opts, Utc::now())
        .await
        .unwrap();
    assert!(second.accepted.is_empty());
}

#[tokio::test]
async fn garbage_model_output_still_yields_a_report() {
    let model = MockProvider::fixed("Sorry, something went wrong on my side.");
    let run = run_digest(MemoryIndex::new(), &providers(), &model, &RunOptions::default(), Utc::now())
        .await
        .unwrap();
    assert_eq!(run.accepted.len(), 4);
    assert_eq!(run.report.strategy, Strategy::Empty);
    assert!(run.report.clusters.is_empty());
}

#[tokio::test]
async fn model_timeout_becomes_empty_text() {
    let opts = RunOptions {
        model_timeout: Duration::from_millis(50),
        ..RunOptions::default()
    };
    let run = run_digest(MemoryIndex::new(), &providers(), &Stalled, &opts, Utc::now())
        .await
        .unwrap();
    assert_eq!(run.accepted.len(), 4);
    assert!(run.model_text.is_empty());
    assert_eq!(run.report.strategy, Strategy::Empty);
}

#[tokio::test]
async fn failing_provider_does_not_stop_the_run() {
    let providers: Vec<Box<dyn SourceProvider>> = vec![
        Box::new(StaticProvider::failing("offline")),
        Box::new(JsonFeedProvider::from_fixture_str("wire", WIRE)),
    ];
    let engine = DigestEngine::new(Arc::new(MockProvider::new()), RunOptions::default());
    let run = engine.run(MemoryIndex::new(), &providers).await.unwrap();
    assert_eq!(run.provider_errors, 1);
    assert_eq!(run.accepted.len(), 3);
    let last = engine.history().last().unwrap();
    assert_eq!(last.provider_errors, 1);
    assert_eq!(last.strategy, Strategy::Strict);
}
