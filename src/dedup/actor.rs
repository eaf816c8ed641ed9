// src/dedup/actor.rs
//! Single-writer owner of the `Deduplicator`.
//!
//! Concurrent producers send articles over a bounded channel; one task runs
//! every check-and-register in arrival order, so two racing evaluations of the
//! same signature can never both be accepted.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::article::Article;
use crate::dedup::index::SignatureStore;
use crate::dedup::{Deduplicator, Verdict};

enum Command {
    Evaluate {
        article: Article,
        reply: oneshot::Sender<Evaluated>,
    },
}

/// An article together with the verdict it received.
#[derive(Debug, Clone)]
pub struct Evaluated {
    pub article: Article,
    pub verdict: Verdict,
}

/// Cheap, cloneable sender side of the actor.
#[derive(Clone)]
pub struct DedupHandle {
    tx: mpsc::Sender<Command>,
}

impl DedupHandle {
    /// Evaluates `article`; it is registered if accepted.
    /// Errors only if the actor has already shut down.
    pub async fn evaluate(&self, article: Article) -> Result<Evaluated> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Evaluate { article, reply })
            .await
            .map_err(|_| anyhow!("dedup actor stopped"))?;
        rx.await.map_err(|_| anyhow!("dedup actor dropped reply"))
    }
}

/// Spawn the actor. All signatures registered during its lifetime are stamped
/// with `run_ts`. The task ends once every `DedupHandle` is dropped and hands
/// the deduplicator (and its store) back through the join handle.
pub fn spawn_dedup_actor<S: SignatureStore>(
    mut dedup: Deduplicator<S>,
    capacity: usize,
    run_ts: DateTime<Utc>,
) -> (DedupHandle, JoinHandle<Deduplicator<S>>) {
    let (tx, mut rx) = mpsc::channel::<Command>(capacity.max(1));
    let join = tokio::spawn(async move {
        let mut evaluated = 0usize;
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Evaluate { article, reply } => {
                    let verdict = dedup.evaluate(&article, run_ts);
                    evaluated += 1;
                    // Caller may have given up waiting; the registration stands.
                    let _ = reply.send(Evaluated { article, verdict });
                }
            }
        }
        tracing::debug!(target: "dedup", evaluated, "dedup actor finished");
        dedup
    });
    (DedupHandle { tx }, join)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::{DedupPolicy, MemoryIndex, Stage};
    use chrono::TimeZone;

    #[tokio::test]
    async fn racing_evaluations_accept_exactly_one() {
        let ts = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let dedup = Deduplicator::new(MemoryIndex::new(), DedupPolicy::default());
        let (handle, join) = spawn_dedup_actor(dedup, 4, ts);

        let mut tasks = Vec::new();
        for i in 0..16 {
            let h = handle.clone();
            let a = Article::new(
                "https://race.test/story",
                format!("headline variant number {i}"),
                format!("body {i}"),
                "Wire",
                ts,
            );
            tasks.push(tokio::spawn(async move { h.evaluate(a).await.unwrap().verdict }));
        }
        drop(handle);

        let mut accepted = 0;
        for t in tasks {
            match t.await.unwrap() {
                Verdict::Accepted => accepted += 1,
                v => assert_eq!(v.stage(), Some(Stage::Url)),
            }
        }
        assert_eq!(accepted, 1);

        let dedup = join.await.unwrap();
        assert_eq!(dedup.store().counts().0, 1);
    }
}
