// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::article::Article;
use crate::dedup::{DedupHandle, RejectCounts, Verdict};
use crate::ingest::types::SourceProvider;
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up in the exposition).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Total raw articles parsed from providers.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_counter!("dedup_accepted_total", "Articles accepted by the dedup cascade.");
        describe_counter!(
            "dedup_rejected_total",
            "Articles rejected by the dedup cascade, by stage."
        );
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when ingest pipeline last ran."
        );
    });
}

/// Result of one ingest pass over all providers.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    /// Accepted articles, grouped by provider in provider order.
    pub accepted: Vec<Article>,
    pub rejected: RejectCounts,
    pub fetched: usize,
    pub provider_errors: usize,
}

#[derive(Default)]
struct ProviderOutcome {
    accepted: Vec<Article>,
    rejected: RejectCounts,
    fetched: usize,
    failed: bool,
}

async fn ingest_provider(provider: &dyn SourceProvider, dedup: &DedupHandle) -> ProviderOutcome {
    let mut out = ProviderOutcome::default();
    let raw = match provider.fetch_latest().await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(target: "ingest", error = ?e, provider = provider.name(), "provider error");
            counter!("ingest_provider_errors_total").increment(1);
            out.failed = true;
            return out;
        }
    };
    out.fetched = raw.len();

    for item in raw {
        match dedup.evaluate(Article::from_raw(item)).await {
            Ok(ev) => match ev.verdict {
                Verdict::Accepted => out.accepted.push(ev.article),
                Verdict::Rejected { stage, .. } => out.rejected.record(stage),
            },
            Err(e) => {
                // Actor gone: nothing further from this provider can be judged.
                tracing::error!(target: "ingest", error = ?e, provider = provider.name(), "dedup unavailable");
                out.failed = true;
                break;
            }
        }
    }
    tracing::debug!(
        target: "ingest",
        provider = provider.name(),
        fetched = out.fetched,
        accepted = out.accepted.len(),
        rejected = out.rejected.total(),
        "provider ingested"
    );
    out
}

/// Run ingest once: providers are fetched concurrently, each provider's
/// articles go through the shared dedup actor in the provider's own order.
pub async fn run_once(providers: &[Box<dyn SourceProvider>], dedup: &DedupHandle) -> IngestOutcome {
    ensure_metrics_described();

    let results = join_all(
        providers
            .iter()
            .map(|p| ingest_provider(p.as_ref(), dedup)),
    )
    .await;

    let mut outcome = IngestOutcome::default();
    for r in results {
        outcome.accepted.extend(r.accepted);
        outcome.rejected.merge(r.rejected);
        outcome.fetched += r.fetched;
        if r.failed {
            outcome.provider_errors += 1;
        }
    }

    let now = chrono::Utc::now().timestamp().max(0);
    gauge!("ingest_pipeline_last_run_ts").set(now as f64);
    tracing::info!(
        target: "ingest",
        providers = providers.len(),
        fetched = outcome.fetched,
        accepted = outcome.accepted.len(),
        dup_url = outcome.rejected.url,
        dup_title = outcome.rejected.title,
        dup_content = outcome.rejected.content,
        provider_errors = outcome.provider_errors,
        "ingest run complete"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::RawArticle;
    use crate::dedup::{spawn_dedup_actor, DedupPolicy, Deduplicator, MemoryIndex};
    use crate::ingest::providers::StaticProvider;
    use chrono::Utc;

    fn raw(url: &str, title: &str) -> RawArticle {
        RawArticle {
            url: url.into(),
            title: title.into(),
            body: String::new(),
            source: "Wire".into(),
            published_at: Utc::now(),
            category: None,
        }
    }

    #[tokio::test]
    async fn provider_error_is_counted_and_others_continue() {
        let dedup = Deduplicator::new(MemoryIndex::new(), DedupPolicy::default());
        let (handle, task) = spawn_dedup_actor(dedup, 8, Utc::now());
        let providers: Vec<Box<dyn SourceProvider>> = vec![
            Box::new(StaticProvider::failing("down")),
            Box::new(StaticProvider::new(
                "up",
                vec![raw("https://a.test/1", "First story"), raw("https://a.test/1", "Again")],
            )),
        ];
        let out = run_once(&providers, &handle).await;
        drop(handle);
        task.await.unwrap();
        assert_eq!(out.provider_errors, 1);
        assert_eq!(out.fetched, 2);
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.rejected.url, 1);
    }
}
