// src/config/digest.rs
use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dedup::title::DEFAULT_TITLE_SIMILARITY;
use crate::dedup::url::{default_tracking_params, UrlPolicy};
use crate::dedup::DedupPolicy;

pub const ENV_PATH: &str = "DIGEST_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub dedup: DedupSection,
    pub prompt: PromptSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSection {
    pub horizon_days: i64,
    pub title_window_days: i64,
    pub title_similarity: f64,
    /// Added to the built-in tracking parameter list.
    pub extra_tracking_params: Vec<String>,
    pub index_path: PathBuf,
    pub channel_capacity: usize,
}

impl Default for DedupSection {
    fn default() -> Self {
        Self {
            horizon_days: 30,
            title_window_days: 3,
            title_similarity: DEFAULT_TITLE_SIMILARITY,
            extra_tracking_params: Vec::new(),
            index_path: PathBuf::from("data/dedup_index.json"),
            channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSection {
    /// Recently covered titles passed as "do not repeat" context.
    pub recent_titles: usize,
    /// Body characters sent per article.
    pub content_chars: usize,
}

impl Default for PromptSection {
    fn default() -> Self {
        Self {
            recent_titles: 30,
            content_chars: 800,
        }
    }
}

impl DigestConfig {
    pub fn to_policy(&self) -> DedupPolicy {
        let mut tracking_params = default_tracking_params();
        for p in &self.dedup.extra_tracking_params {
            if !tracking_params.iter().any(|t| t.eq_ignore_ascii_case(p)) {
                tracking_params.push(p.clone());
            }
        }
        DedupPolicy {
            urls: UrlPolicy { tracking_params },
            horizon: Duration::days(self.dedup.horizon_days),
            title_window: Duration::days(self.dedup.title_window_days),
            title_similarity: self.dedup.title_similarity,
        }
    }

    fn sanitize(mut self) -> Self {
        let d = DedupSection::default();
        if !(1..=3650).contains(&self.dedup.horizon_days) {
            self.dedup.horizon_days = d.horizon_days;
        }
        if self.dedup.title_window_days < 1 {
            self.dedup.title_window_days = d.title_window_days;
        }
        self.dedup.title_window_days = self.dedup.title_window_days.min(self.dedup.horizon_days);
        if !(0.5..=1.0).contains(&self.dedup.title_similarity) {
            self.dedup.title_similarity = d.title_similarity;
        }
        self.dedup.channel_capacity = self.dedup.channel_capacity.clamp(1, 65_536);
        if self.dedup.index_path.as_os_str().is_empty() {
            self.dedup.index_path = d.index_path;
        }
        self.dedup.extra_tracking_params = self
            .dedup
            .extra_tracking_params
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if self.prompt.content_chars == 0 {
            self.prompt.content_chars = PromptSection::default().content_chars;
        }
        self
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<DigestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading digest config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = match ext.as_str() {
        "json" => serde_json::from_str::<DigestConfig>(&content)
            .with_context(|| format!("parsing {}", path.display()))?,
        _ => toml::from_str::<DigestConfig>(&content)
            .with_context(|| format!("parsing {}", path.display()))?,
    };
    Ok(cfg.sanitize())
}

/// Load config using env var + fallbacks:
/// 1) $DIGEST_CONFIG_PATH
/// 2) config/digest.toml
/// 3) config/digest.json
/// 4) built-in defaults
pub fn load_default() -> Result<DigestConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        } else {
            return Err(anyhow!("DIGEST_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/digest.toml");
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from("config/digest.json");
    if json_p.exists() {
        return load_from(&json_p);
    }
    Ok(DigestConfig::default())
}
