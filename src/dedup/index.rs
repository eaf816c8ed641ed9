// src/dedup/index.rs
//! Cross-run signature memory.
//!
//! Three independent sets (URLs, normalized titles, content hashes), each
//! entry stamped with the time it was accepted. Lookups take a `since`
//! horizon: older entries stay in storage but no longer count as duplicates.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::dedup::title::is_near_duplicate;

/// A normalized dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Signature {
    Url(String),
    Title(String),
    Hash(String),
}

/// Storage boundary the `Deduplicator` depends on.
///
/// Implementations need not be thread-safe: the dedup actor is the only
/// writer and serializes every check-and-register.
pub trait SignatureStore: Send + 'static {
    fn contains_url(&self, url: &str, since: DateTime<Utc>) -> bool;
    /// Returns the stored title that `title` duplicates, if any.
    fn similar_title(&self, title: &str, since: DateTime<Utc>, threshold: f64) -> Option<String>;
    fn contains_hash(&self, hash: &str, since: DateTime<Utc>) -> bool;
    fn register(&mut self, signature: Signature, at: DateTime<Utc>);
    /// Most recent titles first; used as "already covered" prompt context.
    fn recent_titles(&self, since: DateTime<Utc>, limit: usize) -> Vec<String>;
    /// Drops entries accepted before `before`. Returns how many were removed.
    fn prune(&mut self, before: DateTime<Utc>) -> usize;
    /// Persists pending registrations. No-op for purely in-memory stores.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory index; also the on-disk document of `FileIndex`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryIndex {
    #[serde(default)]
    urls: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    titles: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    hashes: BTreeMap<String, DateTime<Utc>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (self.urls.len(), self.titles.len(), self.hashes.len())
    }
}

fn live(map: &BTreeMap<String, DateTime<Utc>>, key: &str, since: DateTime<Utc>) -> bool {
    map.get(key).is_some_and(|ts| *ts >= since)
}

fn stamp(map: &mut BTreeMap<String, DateTime<Utc>>, key: String, at: DateTime<Utc>) {
    // Only an expired entry can be re-registered; refresh its stamp.
    let ts = map.entry(key).or_insert(at);
    if *ts < at {
        *ts = at;
    }
}

impl SignatureStore for MemoryIndex {
    fn contains_url(&self, url: &str, since: DateTime<Utc>) -> bool {
        live(&self.urls, url, since)
    }

    fn similar_title(&self, title: &str, since: DateTime<Utc>, threshold: f64) -> Option<String> {
        if title.is_empty() {
            return None;
        }
        if live(&self.titles, title, since) {
            return Some(title.to_string());
        }
        self.titles
            .iter()
            .filter(|(_, ts)| **ts >= since)
            .find(|(t, _)| is_near_duplicate(title, t, threshold))
            .map(|(t, _)| t.clone())
    }

    fn contains_hash(&self, hash: &str, since: DateTime<Utc>) -> bool {
        live(&self.hashes, hash, since)
    }

    fn register(&mut self, signature: Signature, at: DateTime<Utc>) {
        match signature {
            Signature::Url(s) if !s.is_empty() => stamp(&mut self.urls, s, at),
            Signature::Title(s) if !s.is_empty() => stamp(&mut self.titles, s, at),
            Signature::Hash(s) if !s.is_empty() => stamp(&mut self.hashes, s, at),
            _ => {}
        }
    }

    fn recent_titles(&self, since: DateTime<Utc>, limit: usize) -> Vec<String> {
        let mut v: Vec<(&DateTime<Utc>, &String)> = self
            .titles
            .iter()
            .filter(|(_, ts)| **ts >= since)
            .map(|(t, ts)| (ts, t))
            .collect();
        v.sort_by(|a, b| b.0.cmp(a.0).then_with(|| a.1.cmp(b.1)));
        v.into_iter().take(limit).map(|(_, t)| t.clone()).collect()
    }

    fn prune(&mut self, before: DateTime<Utc>) -> usize {
        let before_len = self.len();
        self.urls.retain(|_, ts| *ts >= before);
        self.titles.retain(|_, ts| *ts >= before);
        self.hashes.retain(|_, ts| *ts >= before);
        before_len - self.len()
    }

    fn len(&self) -> usize {
        self.urls.len() + self.titles.len() + self.hashes.len()
    }
}

/// JSON-file backed index. Registrations stay in memory until `flush`, which
/// rewrites the file atomically (temp file + rename).
#[derive(Debug)]
pub struct FileIndex {
    path: PathBuf,
    inner: MemoryIndex,
    dirty: bool,
}

impl FileIndex {
    /// Opens `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let s = fs::read_to_string(&path)
                .with_context(|| format!("reading dedup index from {}", path.display()))?;
            if s.trim().is_empty() {
                MemoryIndex::default()
            } else {
                serde_json::from_str(&s)
                    .with_context(|| format!("parsing dedup index {}", path.display()))?
            }
        } else {
            MemoryIndex::default()
        };
        tracing::debug!(
            target: "dedup",
            path = %path.display(),
            entries = inner.len(),
            "dedup index opened"
        );
        Ok(Self {
            path,
            inner,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn memory(&self) -> &MemoryIndex {
        &self.inner
    }
}

impl SignatureStore for FileIndex {
    fn contains_url(&self, url: &str, since: DateTime<Utc>) -> bool {
        self.inner.contains_url(url, since)
    }

    fn similar_title(&self, title: &str, since: DateTime<Utc>, threshold: f64) -> Option<String> {
        self.inner.similar_title(title, since, threshold)
    }

    fn contains_hash(&self, hash: &str, since: DateTime<Utc>) -> bool {
        self.inner.contains_hash(hash, since)
    }

    fn register(&mut self, signature: Signature, at: DateTime<Utc>) {
        self.inner.register(signature, at);
        self.dirty = true;
    }

    fn recent_titles(&self, since: DateTime<Utc>, limit: usize) -> Vec<String> {
        self.inner.recent_titles(since, limit)
    }

    fn prune(&mut self, before: DateTime<Utc>) -> usize {
        let n = self.inner.prune(before);
        if n > 0 {
            self.dirty = true;
        }
        n
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating index dir {}", dir.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(&self.inner).context("serializing dedup index")?;
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(&json)?;
        f.sync_all()?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        self.dirty = false;
        tracing::debug!(
            target: "dedup",
            path = %self.path.display(),
            entries = self.inner.len(),
            "dedup index flushed"
        );
        Ok(())
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}
