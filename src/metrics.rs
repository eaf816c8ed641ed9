// src/metrics.rs
use anyhow::Context;
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Process-wide Prometheus recorder.
#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Later calls return the same handle.
    pub fn install() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                PrometheusBuilder::new()
                    .install_recorder()
                    .context("prometheus: install recorder")
            })?
            .clone();
        describe_all();
        Ok(Self { handle })
    }

    /// Prometheus exposition text of everything recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

fn describe_all() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        crate::ingest::ensure_metrics_described();
        describe_counter!(
            "report_strategy_total",
            "Parsed model responses, by parse strategy."
        );
        describe_counter!(
            "report_dangling_refs_total",
            "Article references dropped because they resolved to nothing."
        );
        describe_counter!("model_retries_total", "Model calls retried after a transient error.");
        describe_counter!("model_failures_total", "Model calls that produced no text.");
        describe_gauge!("digest_last_run_ts", "Unix ts when the last digest run finished.");
    });
}
