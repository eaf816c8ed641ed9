// src/analyze/mod.rs
//! Model boundary: prompt building and the completion client.

pub mod ai_adapter;
pub mod prompt;

pub use crate::analyze::ai_adapter::{
    build_client_from_config, call_budget, synthesize_report, DisabledClient, DynModelClient,
    MockProvider, ModelClient, ModelError, OpenAiProvider, RetryOnce, RETRY_BACKOFF,
};
pub use crate::analyze::prompt::{build_prompt, Prompt, PromptItem};
