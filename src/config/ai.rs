// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{env, fs, path::Path};

use anyhow::Context;

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

fn default_provider() -> String {
    "openai".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_timeout_secs() -> u64 {
    90
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f32 {
    0.3
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default)]
    pub enabled: bool,
    /// "openai" | "mock" (case-insensitive). Anything else disables the model.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// OpenAI-compatible endpoint root; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl ModelConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading model config {}", path.display()))?;
        let mut cfg: ModelConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing model config {}", path.display()))?;

        cfg.provider = cfg.provider.trim().to_lowercase();

        // Resolve api key if "ENV" (a disabled model needs none)
        if cfg.api_key.trim().eq_ignore_ascii_case("env") && !cfg.enabled {
            cfg.api_key.clear();
        } else if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                // mock never talks to the network
                "mock" => String::new(),
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }

        cfg.sanitize();
        Ok(cfg)
    }

    /// `$DIGEST_AI_CONFIG` or `config/ai.json`; a missing or broken file
    /// yields the disabled default.
    pub fn load() -> Self {
        let path = env::var("DIGEST_AI_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AI_CONFIG_PATH.to_string());
        if !Path::new(&path).exists() {
            tracing::info!(target: "model", %path, "no model config, model disabled");
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(cfg) => {
                // Only provider + enabled + key length
                tracing::info!(
                    target: "model",
                    provider = %cfg.provider,
                    enabled = cfg.enabled,
                    key_len = cfg.api_key.len(),
                    "model config loaded"
                );
                cfg
            }
            Err(e) => {
                tracing::warn!(target: "model", %path, error = %e, "model config rejected, model disabled");
                Self::default()
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn sanitize(&mut self) {
        if self.timeout_secs == 0 || self.timeout_secs > 600 {
            self.timeout_secs = default_timeout_secs();
        }
        if self.max_tokens == 0 {
            self.max_tokens = default_max_tokens();
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        let trimmed = self.base_url.trim().trim_end_matches('/');
        self.base_url = if trimmed.is_empty() {
            default_base_url()
        } else {
            trimmed.to_string()
        };
    }
}
