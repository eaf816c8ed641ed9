//! # Digest Engine
//! One run end to end: ingest through the dedup actor, one model call,
//! tolerant parsing and reference-checked assembly.
//!
//! Nothing in here is fatal to a run except a panic inside the dedup actor:
//! provider errors are counted, model failures become empty text, an index
//! that cannot be written is logged and the run still produces its report.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};

use crate::analyze::{build_prompt, call_budget, DynModelClient, ModelClient, ModelError};
use crate::article::Article;
use crate::config::{DigestConfig, ModelConfig};
use crate::dedup::index::SignatureStore;
use crate::dedup::{spawn_dedup_actor, DedupPolicy, Deduplicator, RejectCounts};
use crate::history::{RunLog, RunSummary};
use crate::ingest::{self, types::SourceProvider};
use crate::report::{assemble_at, parse, FinalReport};

/// Per-run knobs, usually derived from the config files.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub policy: DedupPolicy,
    pub channel_capacity: usize,
    pub recent_titles: usize,
    pub content_chars: usize,
    /// Outer budget for the whole model call, retry included.
    pub model_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&DigestConfig::default(), &ModelConfig::default())
    }
}

impl RunOptions {
    pub fn from_config(digest: &DigestConfig, model: &ModelConfig) -> Self {
        Self {
            policy: digest.to_policy(),
            channel_capacity: digest.dedup.channel_capacity,
            recent_titles: digest.prompt.recent_titles,
            content_chars: digest.prompt.content_chars,
            model_timeout: call_budget(model.timeout()),
        }
    }
}

/// Everything one run produced. The store is handed back so callers can
/// keep an in-memory index across runs.
#[derive(Debug)]
pub struct DigestRun<S> {
    pub report: FinalReport,
    pub accepted: Vec<Article>,
    pub rejected: RejectCounts,
    pub fetched: usize,
    pub provider_errors: usize,
    /// Empty when the model was skipped or failed.
    pub model_text: String,
    pub index_flushed: bool,
    pub summary: RunSummary,
    pub store: S,
}

async fn call_model(model: &dyn ModelClient, prompt: &crate::analyze::Prompt, limit: Duration) -> String {
    let provider = model.provider_name();
    let result = match tokio::time::timeout(limit, model.complete(prompt)).await {
        Ok(r) => r,
        Err(_) => Err(ModelError::Timeout(limit)),
    };
    match result {
        Ok(text) => {
            tracing::debug!(target: "model", provider, len = text.len(), "completion received");
            text
        }
        Err(ModelError::Disabled) => {
            tracing::info!(target: "model", "model disabled, continuing with empty text");
            String::new()
        }
        Err(e) => {
            counter!("model_failures_total", "provider" => provider).increment(1);
            tracing::warn!(target: "model", provider, error = %e, "model call failed, continuing with empty text");
            String::new()
        }
    }
}

/// Run one digest over `providers`, deduplicating against `store`.
pub async fn run_digest<S: SignatureStore>(
    store: S,
    providers: &[Box<dyn SourceProvider>],
    model: &dyn ModelClient,
    opts: &RunOptions,
    now: DateTime<Utc>,
) -> Result<DigestRun<S>> {
    let mut dedup = Deduplicator::new(store, opts.policy.clone());
    let pruned = dedup.prune_expired(now);
    // Titles covered by earlier runs; captured before today's registrations.
    let recent_titles = dedup
        .store()
        .recent_titles(now - opts.policy.title_window, opts.recent_titles);
    tracing::debug!(target: "digest", pruned, index = dedup.store().len(), "index ready");

    let (handle, actor) = spawn_dedup_actor(dedup, opts.channel_capacity, now);
    let outcome = ingest::run_once(providers, &handle).await;
    drop(handle);
    let dedup = actor.await.context("dedup actor panicked")?;

    let mut store = dedup.into_store();
    let index_flushed = match store.flush() {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(target: "digest", error = ?e, "dedup index not persisted");
            false
        }
    };

    let model_text = if outcome.accepted.is_empty() {
        tracing::info!(target: "digest", "no new articles, model call skipped");
        String::new()
    } else {
        let prompt = build_prompt(
            &outcome.accepted,
            &recent_titles,
            opts.recent_titles,
            opts.content_chars,
        );
        call_model(model, &prompt, opts.model_timeout).await
    };

    let parsed = parse(&model_text);
    let report = assemble_at(parsed, &outcome.accepted, now);

    let summary = RunSummary {
        finished_at: Utc::now(),
        fetched: outcome.fetched,
        accepted: outcome.accepted.len(),
        rejected: outcome.rejected,
        provider_errors: outcome.provider_errors,
        strategy: report.strategy,
        dropped_refs: report.dropped_refs,
        clusters: report.clusters.len(),
        newsflash: report.newsflash.len(),
    };
    gauge!("digest_last_run_ts").set(summary.finished_at.timestamp() as f64);
    tracing::info!(
        target: "digest",
        fetched = summary.fetched,
        accepted = summary.accepted,
        rejected = summary.rejected.total(),
        strategy = %summary.strategy,
        clusters = summary.clusters,
        newsflash = summary.newsflash,
        dropped_refs = summary.dropped_refs,
        "digest run finished"
    );

    Ok(DigestRun {
        report,
        accepted: outcome.accepted,
        rejected: outcome.rejected,
        fetched: outcome.fetched,
        provider_errors: outcome.provider_errors,
        model_text,
        index_flushed,
        summary,
        store,
    })
}

/// Long-lived wiring: model client, options and run history.
pub struct DigestEngine {
    model: DynModelClient,
    options: RunOptions,
    history: Arc<RunLog>,
}

impl DigestEngine {
    pub fn new(model: DynModelClient, options: RunOptions) -> Self {
        Self {
            model,
            options,
            history: Arc::new(RunLog::default()),
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn history(&self) -> Arc<RunLog> {
        Arc::clone(&self.history)
    }

    /// Run once at the current time and record the summary.
    pub async fn run<S: SignatureStore>(
        &self,
        store: S,
        providers: &[Box<dyn SourceProvider>],
    ) -> Result<DigestRun<S>> {
        let run = run_digest(store, providers, self.model.as_ref(), &self.options, Utc::now()).await?;
        self.history.push(run.summary.clone());
        Ok(run)
    }
}
