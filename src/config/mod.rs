// src/config/mod.rs
//! File-based configuration: `config/digest.toml` for the pipeline,
//! `config/ai.json` for the model endpoint.

pub mod ai;
pub mod digest;

pub use crate::config::ai::ModelConfig;
pub use crate::config::digest::{DedupSection, DigestConfig, PromptSection};
