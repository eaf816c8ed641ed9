//! history.rs: in-memory log of recent digest runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

use crate::dedup::RejectCounts;
use crate::report::Strategy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub finished_at: DateTime<Utc>,
    pub fetched: usize,
    pub accepted: usize,
    pub rejected: RejectCounts,
    pub provider_errors: usize,
    pub strategy: Strategy,
    pub dropped_refs: usize,
    pub clusters: usize,
    pub newsflash: usize,
}

#[derive(Debug)]
pub struct RunLog {
    inner: Mutex<Vec<RunSummary>>,
    cap: usize,
}

impl Default for RunLog {
    fn default() -> Self {
        Self::with_capacity(100)
    }
}

impl RunLog {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, summary: RunSummary) {
        let mut v = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        v.push(summary);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<RunSummary> {
        let v = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }

    pub fn last(&self) -> Option<RunSummary> {
        self.snapshot_last_n(1).pop()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
