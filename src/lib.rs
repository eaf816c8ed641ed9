// src/lib.rs
// Public library surface for the digest binary and integration tests.

pub mod article;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod report;

// Model boundary (prompt + completion clients)
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use analyze::ai_adapter;
pub use crate::article::{Article, ArticleId, RawArticle};
pub use crate::dedup::{Deduplicator, DedupPolicy, Verdict};
pub use crate::engine::{run_digest, DigestEngine, DigestRun, RunOptions};
pub use crate::report::{FinalReport, Report, Strategy};
