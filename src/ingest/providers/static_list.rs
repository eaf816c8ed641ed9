// src/ingest/providers/static_list.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::article::RawArticle;
use crate::ingest::types::SourceProvider;

/// In-memory provider; optionally fails, to exercise error accounting.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    name: String,
    items: Vec<RawArticle>,
    fail: bool,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, items: Vec<RawArticle>) -> Self {
        Self {
            name: name.into(),
            items,
            fail: false,
        }
    }

    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl SourceProvider for StaticProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawArticle>> {
        if self.fail {
            return Err(anyhow!("{} unavailable", self.name));
        }
        Ok(self.items.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
