// src/analyze/prompt.rs
//! Prompt construction for the digest model call.

use serde::Serialize;

use crate::article::{normalize_text, Article, ArticleId};

pub const DEFAULT_CONTENT_CHARS: usize = 800;
pub const DEFAULT_RECENT_TITLES: usize = 30;

pub const SYSTEM_PROMPT: &str = r#"You are a senior financial research analyst and editor-in-chief.
You receive today's collected news articles as a JSON list. Your job:
1. Drop promotional pieces and merge reports of the same event.
2. Group the remaining articles into core topics and give each topic a short insight explaining the logic behind it.
3. Write a concise overview of market sentiment and the macro picture.

Return ONLY a JSON object, without markdown fences or reasoning, in exactly this shape:
{
  "marketOverview": "overview in about 150 words",
  "clusters": [
    {
      "topic": "topic name",
      "importanceTag": "high | medium | low",
      "summary": "core facts",
      "insight": "analyst commentary",
      "articleRefs": ["<id>", "<id>"]
    }
  ],
  "newsflash": [
    { "articleRef": "<id>", "headline": "headline", "oneLineComment": "one sentence" }
  ]
}
Article references must be copied verbatim from the "id" field of the input."#;

/// One article as the model sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptItem {
    pub id: ArticleId,
    pub title: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub content: String,
    /// `HH:MM` of publication.
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub items: Vec<PromptItem>,
}

impl Prompt {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

pub fn prompt_item(article: &Article, content_chars: usize) -> PromptItem {
    PromptItem {
        id: article.id.clone(),
        title: article.title.trim().to_string(),
        source: article.source.clone(),
        category: article.category.clone(),
        content: truncate_chars(&normalize_text(&article.body), content_chars),
        time: article.published_at.format("%H:%M").to_string(),
    }
}

/// Builds the prompt for one run. At most `recent_limit` of `recent_titles`
/// are included.
pub fn build_prompt(
    accepted: &[Article],
    recent_titles: &[String],
    recent_limit: usize,
    content_chars: usize,
) -> Prompt {
    let items: Vec<PromptItem> = accepted
        .iter()
        .map(|a| prompt_item(a, content_chars))
        .collect();

    let mut user = String::new();
    let recent: Vec<&String> = recent_titles
        .iter()
        .filter(|t| !t.trim().is_empty())
        .take(recent_limit)
        .collect();
    if !recent.is_empty() {
        user.push_str("Topics already covered in recent digests (skip unless there is a material update):\n");
        for t in recent {
            user.push_str("- ");
            user.push_str(t.trim());
            user.push('\n');
        }
        user.push('\n');
    }
    let list = serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string());
    user.push_str("Today's collected articles (JSON):\n\n");
    user.push_str(&list);
    user.push_str("\n\nAnalyze them and return the JSON report.");

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
        items,
    }
}
