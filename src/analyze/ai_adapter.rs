//! Model adapter: provider abstraction, OpenAI-compatible provider, mock and
//! disabled clients, and a single-retry wrapper for transient failures.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::analyze::prompt::Prompt;
use crate::config::ai::ModelConfig;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model client is disabled")]
    Disabled,
    #[error("no api key configured for {0}")]
    MissingKey(&'static str),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("endpoint returned HTTP {0}")]
    Status(u16),
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed completion: {0}")]
    Malformed(String),
}

impl ModelError {
    /// Worth one more attempt: connection trouble, timeouts, 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ModelError::Status(code) => *code == 429 || *code >= 500,
            ModelError::Timeout(_) => true,
            ModelError::Disabled | ModelError::MissingKey(_) | ModelError::Malformed(_) => false,
        }
    }
}

pub type ModelFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ModelError>> + Send + 'a>>;

/// Text-completion boundary used by the digest engine.
pub trait ModelClient: Send + Sync {
    /// Send the prompt and return the raw completion text.
    fn complete<'a>(&'a self, prompt: &'a Prompt) -> ModelFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynModelClient = Arc<dyn ModelClient>;

/// Factory: build a client according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns the mock client.
/// * Else if `config.enabled==false`, returns a disabled client.
/// * Else builds the configured provider wrapped with a single retry.
pub fn build_client_from_config(config: &ModelConfig) -> DynModelClient {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockProvider::new());
    }

    if !config.enabled {
        return Arc::new(DisabledClient);
    }

    match config.provider.as_str() {
        "openai" => match OpenAiProvider::new(config) {
            Ok(provider) => Arc::new(RetryOnce::new(provider)),
            Err(e) => {
                tracing::warn!(target: "model", error = %e, "openai provider unavailable, model disabled");
                Arc::new(DisabledClient)
            }
        },
        "mock" => Arc::new(MockProvider::new()),
        other => {
            tracing::warn!(target: "model", provider = other, "unknown provider, model disabled");
            Arc::new(DisabledClient)
        }
    }
}

// ------------------------------------------------------------
// Concrete providers
// ------------------------------------------------------------

/// OpenAI-compatible chat completions provider.
pub struct OpenAiProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        if config.api_key.trim().is_empty() {
            return Err(ModelError::MissingKey("openai"));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("news-digest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    async fn complete_impl(&self, prompt: &Prompt) -> Result<String, ModelError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &prompt.system,
                },
                Msg {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ModelError::Status(status.as_u16()));
        }
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ModelError::Malformed(e.to_string()))?;
        // An empty completion is handed to the parser as-is.
        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

impl ModelClient for OpenAiProvider {
    fn complete<'a>(&'a self, prompt: &'a Prompt) -> ModelFuture<'a> {
        Box::pin(self.complete_impl(prompt))
    }
    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Always fails with `ModelError::Disabled`; used when the model is off.
pub struct DisabledClient;

impl ModelClient for DisabledClient {
    fn complete<'a>(&'a self, _prompt: &'a Prompt) -> ModelFuture<'a> {
        Box::pin(async { Err(ModelError::Disabled) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Offline provider for tests and local runs.
///
/// Scripted replies are consumed first; once exhausted it returns the fixed
/// reply if one is set, otherwise it synthesizes a well-formed report from
/// the prompt items (one cluster per category, first items as newsflash).
#[derive(Default)]
pub struct MockProvider {
    script: Mutex<VecDeque<Result<String, ModelError>>>,
    fixed: Option<String>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            fixed: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn scripted(replies: impl IntoIterator<Item = Result<String, ModelError>>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn next_scripted(&self) -> Option<Result<String, ModelError>> {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}

/// Deterministic report over the prompt items.
pub fn synthesize_report(prompt: &Prompt) -> String {
    let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for item in &prompt.items {
        let key = item.category.as_deref().unwrap_or(item.source.as_str());
        groups.entry(key).or_default().push(item.id.as_str());
    }
    let clusters: Vec<_> = groups
        .iter()
        .map(|(topic, ids)| {
            json!({
                "topic": topic,
                "importanceTag": if ids.len() > 2 { "high" } else { "medium" },
                "insight": format!("{} related reports", ids.len()),
                "articleRefs": ids,
            })
        })
        .collect();
    let newsflash: Vec<_> = prompt
        .items
        .iter()
        .take(5)
        .map(|i| {
            json!({
                "articleRef": i.id.as_str(),
                "headline": i.title,
                "oneLineComment": format!("{} via {}", i.title, i.source),
            })
        })
        .collect();
    json!({
        "marketOverview": format!(
            "{} articles across {} topics.",
            prompt.items.len(),
            groups.len()
        ),
        "clusters": clusters,
        "newsflash": newsflash,
    })
    .to_string()
}

impl ModelClient for MockProvider {
    fn complete<'a>(&'a self, prompt: &'a Prompt) -> ModelFuture<'a> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let out = match self.next_scripted() {
            Some(r) => r,
            None => Ok(self
                .fixed
                .clone()
                .unwrap_or_else(|| synthesize_report(prompt))),
        };
        Box::pin(async move { out })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Retry wrapper
// ------------------------------------------------------------

/// Pause between the failed attempt and the retry.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Wall-clock budget for one `RetryOnce` call: two attempts, the backoff
/// and a second of slack for scheduling.
pub fn call_budget(per_attempt: Duration) -> Duration {
    per_attempt * 2 + RETRY_BACKOFF + Duration::from_secs(1)
}

/// Retries a transient failure exactly once after `backoff`.
pub struct RetryOnce<C: ModelClient> {
    inner: C,
    backoff: Duration,
}

impl<C: ModelClient> RetryOnce<C> {
    pub fn new(inner: C) -> Self {
        Self::with_backoff(inner, RETRY_BACKOFF)
    }

    pub fn with_backoff(inner: C, backoff: Duration) -> Self {
        Self { inner, backoff }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn complete_impl(&self, prompt: &Prompt) -> Result<String, ModelError> {
        match self.inner.complete(prompt).await {
            Err(e) if e.is_transient() => {
                counter!("model_retries_total", "provider" => self.inner.provider_name())
                    .increment(1);
                tracing::warn!(target: "model", error = %e, "transient model failure, retrying once");
                tokio::time::sleep(self.backoff).await;
                self.inner.complete(prompt).await
            }
            other => other,
        }
    }
}

impl<C: ModelClient> ModelClient for RetryOnce<C> {
    fn complete<'a>(&'a self, prompt: &'a Prompt) -> ModelFuture<'a> {
        Box::pin(self.complete_impl(prompt))
    }
    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}
