//! CISA Known Exploited Vulnerabilities catalog cache.
//!
//! The whole catalog is small (low thousands of entries) and changes a few
//! times a week, so it is cached as one JSON file and refreshed on a weekly
//! cadence. KEV membership forces a finding's priority to the KEV floor.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use dragnet_utils::atomic_write_json;

const KEV_FEED: &str =
    "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json";
const CACHE_FILE: &str = "kev.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    fetched_at_ms: i64,
    /// CVE id -> remediation due date (`YYYY-MM-DD`).
    entries: HashMap<String, String>,
}

/// On-disk KEV catalog cache.
pub struct KevStore {
    path: PathBuf,
    refresh_after_ms: i64,
    cache: CacheFile,
}

impl KevStore {
    #[must_use]
    pub fn load(cache_dir: &Path, refresh_days: u64) -> Self {
        let path = cache_dir.join(CACHE_FILE);
        let cache = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        Self {
            path,
            refresh_after_ms: (refresh_days as i64) * 24 * 3600 * 1000,
            cache,
        }
    }

    /// A stale catalog still answers lookups; staleness only triggers a
    /// refresh attempt. Exploited-vulnerability data degrades gracefully.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.cache.fetched_at_ms + self.refresh_after_ms < now_ms()
    }

    #[must_use]
    pub fn contains(&self, cve: &str) -> bool {
        self.cache.entries.contains_key(cve)
    }

    /// KEV remediation due date, when the CVE is in the catalog.
    #[must_use]
    pub fn due_date(&self, cve: &str) -> Option<String> {
        self.cache.entries.get(cve).cloned()
    }

    /// Download the full catalog if the cached copy is past its refresh
    /// window. Best-effort; the old copy stays usable on failure.
    pub async fn refresh_if_stale(&mut self) -> anyhow::Result<()> {
        if !self.is_stale() {
            return Ok(());
        }
        let body: serde_json::Value = reqwest::Client::new()
            .get(KEV_FEED)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let Some(vulns) = body
            .get("vulnerabilities")
            .and_then(serde_json::Value::as_array)
        else {
            anyhow::bail!("KEV feed missing vulnerabilities array");
        };

        let mut entries = HashMap::with_capacity(vulns.len());
        for vuln in vulns {
            let (Some(cve), due) = (
                vuln.get("cveID").and_then(serde_json::Value::as_str),
                vuln.get("dueDate")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default(),
            ) else {
                continue;
            };
            entries.insert(cve.to_string(), due.to_string());
        }
        self.cache = CacheFile {
            fetched_at_ms: now_ms(),
            entries,
        };
        if let Err(e) = atomic_write_json(&self.path, &self.cache) {
            tracing::warn!(path = %self.path.display(), "failed to persist KEV cache: {e}");
        }
        tracing::info!(entries = self.cache.entries.len(), "KEV catalog refreshed");
        Ok(())
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::KevStore;

    #[test]
    fn cached_catalog_answers_lookups() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("kev.json"),
            format!(
                r#"{{"fetched_at_ms": {}, "entries": {{"CVE-2021-44228": "2021-12-24"}}}}"#,
                super::now_ms()
            ),
        )
        .unwrap();

        let store = KevStore::load(dir.path(), 7);
        assert!(!store.is_stale());
        assert!(store.contains("CVE-2021-44228"));
        assert_eq!(store.due_date("CVE-2021-44228").as_deref(), Some("2021-12-24"));
        assert!(store.due_date("CVE-2020-0001").is_none());
    }

    #[test]
    fn stale_catalog_still_answers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("kev.json"),
            r#"{"fetched_at_ms": 1000, "entries": {"CVE-2021-44228": "2021-12-24"}}"#,
        )
        .unwrap();

        let store = KevStore::load(dir.path(), 7);
        assert!(store.is_stale());
        assert!(store.contains("CVE-2021-44228"));
    }

    #[test]
    fn missing_file_is_empty_and_stale() {
        let dir = tempfile::tempdir().unwrap();
        let store = KevStore::load(dir.path(), 7);
        assert!(store.is_stale());
        assert!(!store.contains("CVE-2021-44228"));
    }
}
