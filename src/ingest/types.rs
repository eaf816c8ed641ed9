// src/ingest/types.rs
use anyhow::Result;

use crate::article::RawArticle;

/// Upstream collaborator delivering raw articles for one run.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawArticle>>;
    fn name(&self) -> &str;
}
