// src/report/extract.rs
//! Last-resort field salvage from text that no longer parses as JSON.
//!
//! Two independent passes:
//! - JSON-ish: the text is cut into flat chunks at `{`/`}` and each chunk's
//!   `"key": value` pairs are read with a regex. Chunks are classified by the
//!   keys they carry (overview, cluster, newsflash item).
//! - Markdown-ish: heading markers (`## Market Overview`, `**Newsflash**`,
//!   `市场综述：`) introduce sections; bullet lines under the cluster and
//!   newsflash headings become items.
//!
//! The JSON-ish pass wins per field; the markdown pass fills whatever it left
//! empty.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

use crate::article::ArticleId;
use crate::report::{clean_field, Cluster, Importance, NewsFlash};

/// Whatever could be located; `None`/empty means "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub overview: Option<String>,
    pub clusters: Vec<Cluster>,
    pub newsflash: Vec<NewsFlash>,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.overview.is_none() && self.clusters.is_empty() && self.newsflash.is_empty()
    }
}

pub fn extract(raw: &str) -> Extracted {
    let mut out = extract_json_like(raw);
    if out.overview.is_some() && !out.clusters.is_empty() && !out.newsflash.is_empty() {
        return out;
    }
    let md = extract_markdown(raw);
    if out.overview.is_none() {
        out.overview = md.overview;
    }
    if out.clusters.is_empty() {
        out.clusters = md.clusters;
    }
    if out.newsflash.is_empty() {
        out.newsflash = md.newsflash;
    }
    out
}

// ------------------------------------------------------------
// JSON-ish pass
// ------------------------------------------------------------

fn re_pair() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(
            r#""([A-Za-z_][A-Za-z0-9_]*)"\s*:\s*(?:"((?:[^"\\]|\\.)*)"|(\[[^\[\]{}]*\])|(-?\d+(?:\.\d+)?))"#,
        )
        .expect("pair regex")
    })
}

#[derive(Debug, Clone)]
enum Val {
    Str(String),
    List(Vec<String>),
    Num(String),
}

impl Val {
    fn as_text(&self) -> Option<String> {
        match self {
            Val::Str(s) | Val::Num(s) => clean_field(s),
            Val::List(_) => None,
        }
    }
}

/// Lower-cased key with underscores removed: `related_article_ids` and
/// `relatedArticleIds` compare equal.
fn canon_key(k: &str) -> String {
    k.chars().filter(|c| *c != '_').flat_map(char::to_lowercase).collect()
}

fn unescape_json_str(s: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{s}\"")).unwrap_or_else(|_| s.replace("\\n", " "))
}

fn list_items(inner: &str) -> Vec<String> {
    inner
        .trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(|t| t.trim().trim_matches('"').trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn chunk_pairs(chunk: &str) -> HashMap<String, Val> {
    let mut map = HashMap::new();
    for caps in re_pair().captures_iter(chunk) {
        let key = canon_key(&caps[1]);
        let val = if let Some(s) = caps.get(2) {
            Val::Str(unescape_json_str(s.as_str()))
        } else if let Some(l) = caps.get(3) {
            Val::List(list_items(l.as_str()))
        } else if let Some(n) = caps.get(4) {
            Val::Num(n.as_str().to_string())
        } else {
            continue;
        };
        map.entry(key).or_insert(val);
    }
    map
}

fn first<'a>(map: &'a HashMap<String, Val>, keys: &[&str]) -> Option<&'a Val> {
    keys.iter().find_map(|k| map.get(*k))
}

fn first_text(map: &HashMap<String, Val>, keys: &[&str]) -> Option<String> {
    first(map, keys).and_then(Val::as_text)
}

const OVERVIEW_KEYS: &[&str] = &["marketoverview", "marketsentiment", "marketsummary", "overview"];
const TOPIC_KEYS: &[&str] = &["topic", "theme", "title"];
const IMPORTANCE_KEYS: &[&str] = &["importancetag", "importance"];
const REFS_KEYS: &[&str] = &["articlerefs", "relatedarticleids", "articleids", "refs"];
const INSIGHT_KEYS: &[&str] = &["insight"];
const SUMMARY_KEYS: &[&str] = &["summary"];
const COMMENT_KEYS: &[&str] = &["onelinecomment", "onesentencecomment", "comment"];
const FLASH_REF_KEYS: &[&str] = &["articleref", "articleid", "id"];
const HEADLINE_KEYS: &[&str] = &["headline", "title"];

fn extract_json_like(raw: &str) -> Extracted {
    let mut out = Extracted::default();
    for chunk in raw.split(['{', '}']) {
        let map = chunk_pairs(chunk);
        if map.is_empty() {
            continue;
        }
        if out.overview.is_none() {
            out.overview = first_text(&map, OVERVIEW_KEYS);
        }

        if first(&map, COMMENT_KEYS).is_some() {
            let Some(comment) = first_text(&map, COMMENT_KEYS) else {
                continue;
            };
            out.newsflash.push(NewsFlash {
                article_ref: first_text(&map, FLASH_REF_KEYS).map(ArticleId::new),
                headline: first_text(&map, HEADLINE_KEYS),
                comment,
            });
        } else if first(&map, INSIGHT_KEYS).is_some()
            || first(&map, IMPORTANCE_KEYS).is_some()
            || first(&map, REFS_KEYS).is_some()
        {
            let topic = first_text(&map, TOPIC_KEYS).unwrap_or_default();
            let insight = first_text(&map, INSIGHT_KEYS).unwrap_or_default();
            if topic.is_empty() && insight.is_empty() {
                continue;
            }
            let article_refs = match first(&map, REFS_KEYS) {
                Some(Val::List(items)) => items.iter().map(|s| ArticleId::new(s.as_str())).collect(),
                Some(v) => v.as_text().map(ArticleId::new).into_iter().collect(),
                None => BTreeSet::new(),
            };
            out.clusters.push(Cluster {
                topic,
                importance: first_text(&map, IMPORTANCE_KEYS)
                    .map(|s| Importance::parse_tag(&s))
                    .unwrap_or_default(),
                article_refs,
                summary: first_text(&map, SUMMARY_KEYS),
                insight,
            });
        }
    }
    out
}

// ------------------------------------------------------------
// Markdown-ish pass
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Overview,
    Clusters,
    Newsflash,
}

fn re_heading() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*|__)?\s*((?:market\s+overview|market\s+sentiment|market\s+summary|overview|key\s+themes|themes|clusters|topics|news\s*flash)\b|市场综述|市场情绪|综述|主题聚类|主题|快讯|新闻快讯)\s*(?:\*\*|__)?\s*[:：]?\s*(?:\*\*|__)?\s*(.*)$",
        )
        .expect("heading regex")
    })
}

fn re_bullet() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[-*•+]|\d+[.)])\s+(.+)$").expect("bullet regex"))
}

fn section_of(label: &str) -> Section {
    let l = label.to_lowercase();
    if l.contains("flash") || l.contains("快讯") {
        Section::Newsflash
    } else if l.contains("overview")
        || l.contains("sentiment")
        || l.contains("summary")
        || l.contains("综述")
        || l.contains("情绪")
    {
        Section::Overview
    } else {
        Section::Clusters
    }
}

fn is_any_heading(line: &str) -> bool {
    line.trim_start().starts_with('#') || re_heading().is_match(line)
}

fn extract_markdown(raw: &str) -> Extracted {
    let mut out = Extracted::default();
    let mut current: Option<Section> = None;
    let mut overview_parts: Vec<String> = Vec::new();
    let mut overview_done = false;

    for line in raw.lines() {
        if let Some(caps) = re_heading().captures(line) {
            let section = section_of(&caps[1]);
            current = Some(section);
            let inline = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            if section == Section::Overview && !overview_done {
                if let Some(text) = clean_field(&strip_md(inline)) {
                    overview_parts.push(text);
                }
            }
            continue;
        }
        if is_any_heading(line) {
            if current == Some(Section::Overview) && !overview_parts.is_empty() {
                overview_done = true;
            }
            current = None;
            continue;
        }

        match current {
            Some(Section::Overview) if !overview_done => {
                if line.trim().is_empty() {
                    if !overview_parts.is_empty() {
                        overview_done = true;
                    }
                } else if let Some(text) = clean_field(&strip_md(line)) {
                    overview_parts.push(text);
                }
            }
            Some(Section::Clusters) => {
                if let Some(item) = re_bullet().captures(line) {
                    if let Some(c) = parse_cluster_bullet(&item[1]) {
                        out.clusters.push(c);
                    }
                }
            }
            Some(Section::Newsflash) => {
                if let Some(item) = re_bullet().captures(line) {
                    if let Some(f) = parse_flash_bullet(&item[1]) {
                        out.newsflash.push(f);
                    }
                }
            }
            _ => {}
        }
    }

    out.overview = clean_field(&overview_parts.join(" "));
    out
}

fn strip_md(s: &str) -> String {
    s.replace("**", "").replace("__", "")
}

/// Splits a "Topic: rest" style line at the first separator.
fn split_label(s: &str) -> (String, Option<String>) {
    let seps = ["：", ": ", " — ", " – ", " - "];
    let hit = seps
        .iter()
        .filter_map(|sep| s.find(sep).map(|i| (i, *sep)))
        .min_by_key(|(i, _)| *i);
    match hit {
        Some((i, sep)) => (
            s[..i].trim().to_string(),
            clean_field(&s[i + sep.len()..]),
        ),
        None => (s.trim().to_string(), None),
    }
}

fn re_refs() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[\[(](?:refs?|ids?|articles?)\s*[:：]\s*([^\])]*)[\])]").expect("refs regex")
    })
}

fn re_importance() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[\[(（](high|medium|low|高|中|低)[\])）]").expect("importance regex")
    })
}

fn parse_cluster_bullet(text: &str) -> Option<Cluster> {
    let mut text = strip_md(text);

    let mut article_refs = BTreeSet::new();
    if let Some(caps) = re_refs().captures(&text) {
        article_refs = list_items(&caps[1]).into_iter().map(ArticleId::new).collect();
        text = re_refs().replace(&text, "").into_owned();
    }

    let mut importance = Importance::Unspecified;
    if let Some(caps) = re_importance().captures(&text) {
        importance = Importance::parse_tag(&caps[1]);
        text = re_importance().replace(&text, "").into_owned();
    }

    let (topic, insight) = split_label(&text);
    let topic = clean_field(&topic)?;
    Some(Cluster {
        topic,
        importance,
        article_refs,
        summary: None,
        insight: insight.unwrap_or_default(),
    })
}

fn re_flash_ref() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^\s*\[([^\]\s]+)\]\s*(.*)$").expect("flash ref regex"))
}

fn parse_flash_bullet(text: &str) -> Option<NewsFlash> {
    let text = strip_md(text);
    let (article_ref, rest) = match re_flash_ref().captures(&text) {
        Some(caps) => (Some(ArticleId::new(&caps[1])), caps[2].to_string()),
        None => (None, text.clone()),
    };
    let (head, tail) = split_label(&rest);
    let (headline, comment) = match tail {
        Some(comment) => (clean_field(&head), comment),
        None => (None, clean_field(&head)?),
    };
    Some(NewsFlash {
        article_ref,
        headline,
        comment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salvages_fields_from_broken_json() {
        let raw = r#"{"market_sentiment": "Risk-on tone", "themes": [
            {"title": "Rate cuts", "importance": "高", "summary": "Fed hints",
             "insight": "Banks benefit", "related_article_ids": [0, "a1"]},
            {"title": "Insurers", "insight": "Premiums grow" "oops
        ], "news_flash": [{"id": 2, "title": "CPI", "one_sentence_comment": "Cooler than feared"}"#;
        let ex = extract(raw);
        assert_eq!(ex.overview.as_deref(), Some("Risk-on tone"));
        assert_eq!(ex.clusters.len(), 2);
        assert_eq!(ex.clusters[0].importance, Importance::High);
        assert_eq!(ex.clusters[0].summary.as_deref(), Some("Fed hints"));
        assert!(ex.clusters[0].article_refs.contains(&ArticleId::from("a1")));
        assert!(ex.clusters[0].article_refs.contains(&ArticleId::from("0")));
        assert_eq!(ex.newsflash.len(), 1);
        assert_eq!(ex.newsflash[0].article_ref, Some(ArticleId::from("2")));
        assert_eq!(ex.newsflash[0].comment, "Cooler than feared");
    }

    #[test]
    fn reads_markdown_sections() {
        let raw = "## Market Overview\nStocks rallied on\nrate-cut hopes.\n\nMore prose.\n\n\
                   ## Key Themes\n- **Banks** (high): margins widen [refs: a1, b2]\n\
                   - Insurers — premiums climb\n\n\
                   ### Newsflash\n- [c3] CPI: cooler than feared\n- Regulator fines broker\n";
        let ex = extract(raw);
        assert_eq!(ex.overview.as_deref(), Some("Stocks rallied on rate-cut hopes."));
        assert_eq!(ex.clusters.len(), 2);
        assert_eq!(ex.clusters[0].topic, "Banks");
        assert_eq!(ex.clusters[0].importance, Importance::High);
        assert_eq!(ex.clusters[0].insight, "margins widen");
        assert_eq!(ex.clusters[0].article_refs.len(), 2);
        assert_eq!(ex.clusters[1].topic, "Insurers");
        assert_eq!(ex.newsflash.len(), 2);
        assert_eq!(ex.newsflash[0].article_ref, Some(ArticleId::from("c3")));
        assert_eq!(ex.newsflash[0].headline.as_deref(), Some("CPI"));
        assert_eq!(ex.newsflash[1].article_ref, None);
        assert_eq!(ex.newsflash[1].comment, "Regulator fines broker");
    }

    #[test]
    fn inline_overview_heading() {
        let ex = extract("**Market Overview:** Calm session overall.\nunrelated tail");
        assert_eq!(
            ex.overview.as_deref(),
            Some("Calm session overall. unrelated tail")
        );
    }

    #[test]
    fn plain_prose_yields_nothing() {
        assert!(extract("I'm sorry, I cannot help with that.").is_empty());
        assert!(extract("").is_empty());
    }

    #[test]
    fn words_starting_with_a_label_are_not_headings() {
        assert!(extract("Overviewing the data, nothing to report.").is_empty());
        assert!(extract("Topicsless chatter\nThemeselves aside").is_empty());
        let ex = extract("Overview: steady.");
        assert_eq!(ex.overview.as_deref(), Some("steady."));
    }
}
