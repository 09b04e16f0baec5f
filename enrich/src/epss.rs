//! EPSS score cache.
//!
//! Scores live in one JSON file under the cache directory; the whole file is
//! valid for the configured TTL (default 30 days) and refreshed in batches
//! from the FIRST.org API on misses. Lookups never touch the network.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use dragnet_types::Epss;
use dragnet_utils::atomic_write_json;

const EPSS_API: &str = "https://api.first.org/data/v1/epss";
const CACHE_FILE: &str = "epss.json";
/// FIRST.org caps the `cve` query parameter; stay well under it.
const BATCH_SIZE: usize = 100;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    fetched_at_ms: i64,
    scores: HashMap<String, CachedScore>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct CachedScore {
    score: f64,
    percentile: f64,
}

/// On-disk EPSS cache with read-mostly semantics.
pub struct EpssStore {
    path: PathBuf,
    ttl_ms: i64,
    cache: CacheFile,
}

impl EpssStore {
    /// Load the cache file; a missing or unreadable file is an empty cache.
    #[must_use]
    pub fn load(cache_dir: &Path, ttl_days: u64) -> Self {
        let path = cache_dir.join(CACHE_FILE);
        let cache = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        let mut store = Self {
            path,
            ttl_ms: (ttl_days as i64) * 24 * 3600 * 1000,
            cache,
        };
        if store.is_expired() {
            tracing::debug!("EPSS cache expired; dropping {} entries", store.cache.scores.len());
            store.cache = CacheFile::default();
        }
        store
    }

    fn is_expired(&self) -> bool {
        self.cache.fetched_at_ms + self.ttl_ms < now_ms()
    }

    #[must_use]
    pub fn contains(&self, cve: &str) -> bool {
        self.cache.scores.contains_key(cve)
    }

    #[must_use]
    pub fn lookup(&self, cve: &str) -> Option<Epss> {
        self.cache.scores.get(cve).map(|s| Epss {
            score: s.score,
            percentile: s.percentile,
        })
    }

    /// Fetch scores for `missing` CVEs in batches and persist the merged
    /// cache. Best-effort: the first failed batch aborts the refresh and the
    /// error is surfaced for logging only.
    pub async fn refresh(&mut self, missing: &[String]) -> anyhow::Result<()> {
        if missing.is_empty() {
            return Ok(());
        }
        let client = reqwest::Client::new();
        for batch in missing.chunks(BATCH_SIZE) {
            let url = format!("{EPSS_API}?cve={}", batch.join(","));
            let body: serde_json::Value = client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let Some(rows) = body.get("data").and_then(serde_json::Value::as_array) else {
                anyhow::bail!("EPSS response missing data array");
            };
            for row in rows {
                let (Some(cve), Some(score), Some(percentile)) = (
                    row.get("cve").and_then(serde_json::Value::as_str),
                    parse_float(row.get("epss")),
                    parse_float(row.get("percentile")),
                ) else {
                    continue;
                };
                self.cache
                    .scores
                    .insert(cve.to_string(), CachedScore { score, percentile });
            }
        }
        if self.cache.fetched_at_ms == 0 {
            self.cache.fetched_at_ms = now_ms();
        }
        if let Err(e) = atomic_write_json(&self.path, &self.cache) {
            tracing::warn!(path = %self.path.display(), "failed to persist EPSS cache: {e}");
        }
        Ok(())
    }
}

/// The EPSS API returns numbers as strings.
fn parse_float(value: Option<&serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
