//! News Digest: binary entrypoint.
//! Runs one digest over the given JSON feeds (files or http URLs) and prints
//! the final report as JSON on stdout.
//!
//! Usage: `news-digest <feed> [<feed>...]`

use std::path::Path;

use anyhow::{bail, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_digest::analyze::build_client_from_config;
use news_digest::config::{digest, ModelConfig};
use news_digest::dedup::FileIndex;
use news_digest::ingest::providers::JsonFeedProvider;
use news_digest::ingest::types::SourceProvider;
use news_digest::metrics::Metrics;
use news_digest::{DigestEngine, RunOptions};

/// Compact logs on stderr; JSON lines when DIGEST_LOG_JSON=1.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("news_digest=info,warn"));
    let json = std::env::var("DIGEST_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn provider_for(arg: &str) -> Box<dyn SourceProvider> {
    if arg.starts_with("http://") || arg.starts_with("https://") {
        let name = url::Url::parse(arg)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| arg.to_string());
        return Box::new(JsonFeedProvider::from_url(name, arg));
    }
    let name = Path::new(arg)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(arg)
        .to_string();
    Box::new(JsonFeedProvider::from_file(name, arg))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; OPENAI_API_KEY and the config paths may live there.
    let _ = dotenvy::dotenv();
    init_tracing();

    let feeds: Vec<String> = std::env::args().skip(1).collect();
    if feeds.is_empty() {
        bail!("usage: news-digest <feed.json|url> [...]");
    }

    let metrics = Metrics::install()?;
    let digest_cfg = digest::load_default()?;
    let model_cfg = ModelConfig::load();

    let providers: Vec<Box<dyn SourceProvider>> = feeds.iter().map(|f| provider_for(f)).collect();
    let index = FileIndex::open(&digest_cfg.dedup.index_path)?;
    let engine = DigestEngine::new(
        build_client_from_config(&model_cfg),
        RunOptions::from_config(&digest_cfg, &model_cfg),
    );

    let run = engine.run(index, &providers).await?;
    println!("{}", serde_json::to_string_pretty(&run.report)?);

    if std::env::var("DIGEST_PRINT_METRICS").is_ok_and(|v| v == "1") {
        eprintln!("{}", metrics.render());
    }
    Ok(())
}
