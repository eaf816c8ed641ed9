//! Demo: two consecutive runs over the same fixture feeds with the mock model.
//! The second run finds nothing new, which shows the cross-run index at work.

use std::sync::Arc;

use chrono::Utc;
use news_digest::analyze::MockProvider;
use news_digest::dedup::MemoryIndex;
use news_digest::ingest::providers::JsonFeedProvider;
use news_digest::ingest::types::SourceProvider;
use news_digest::{run_digest, RunOptions};

const WIRE: &str = include_str!("../../tests/fixtures/feed_wire.json");
const DESK: &str = include_str!("../../tests/fixtures/feed_desk.json");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let providers: Vec<Box<dyn SourceProvider>> = vec![
        Box::new(JsonFeedProvider::from_fixture_str("wire", WIRE)),
        Box::new(JsonFeedProvider::from_fixture_str("desk", DESK)),
    ];
    let model = Arc::new(MockProvider::new());
    let opts = RunOptions::default();

    let mut index = MemoryIndex::new();
    for round in 1..=2 {
        let run = run_digest(index, &providers, model.as_ref(), &opts, Utc::now()).await?;
        println!(
            "round {round}: fetched={} accepted={} rejected={} strategy={} clusters={} newsflash={}",
            run.fetched,
            run.accepted.len(),
            run.rejected.total(),
            run.report.strategy,
            run.report.clusters.len(),
            run.report.newsflash.len(),
        );
        index = run.store;
    }

    println!("digest-demo done");
    Ok(())
}
