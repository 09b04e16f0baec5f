//! SQLite-backed scan history.
//!
//! One writer, many readers (WAL). `store_scan` is atomic: the scan row,
//! every finding row, and the digest land in one transaction or not at all.
//! `verify` recomputes each scan's fingerprint digest against the stored
//! one to catch partial writes and external tampering.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};

use dragnet_types::{Finding, Scan, SeverityCounts};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("history database error")]
    Db(#[from] rusqlite::Error),
    #[error("history record serialization error")]
    Serde(#[from] serde_json::Error),
    #[error("history database directory error")]
    Io(#[from] std::io::Error),
}

/// A row from `list_scans`: enough to render a history listing without
/// loading findings.
#[derive(Debug, Clone)]
pub struct ScanSummaryRow {
    pub scan_id: String,
    pub timestamp_ms: i64,
    pub branch: Option<String>,
    pub outcome: String,
    pub duration_ms: u64,
    pub summary: SeverityCounts,
    pub finding_count: u64,
}

/// Append-only store of scans and their findings.
pub struct HistoryStore {
    db: Connection,
}

impl HistoryStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS scans (
            scan_id TEXT PRIMARY KEY,
            timestamp_ms INTEGER NOT NULL,
            branch TEXT,
            outcome TEXT NOT NULL,
            duration_ms INTEGER NOT NULL,
            findings_digest TEXT NOT NULL,
            scan_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS findings (
            scan_id TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            severity TEXT NOT NULL,
            rule_id TEXT NOT NULL,
            tool TEXT NOT NULL,
            path TEXT NOT NULL,
            finding_json TEXT NOT NULL,
            PRIMARY KEY (scan_id, fingerprint),
            FOREIGN KEY (scan_id) REFERENCES scans(scan_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_scans_branch_ts
        ON scans(branch, timestamp_ms);

        CREATE INDEX IF NOT EXISTS idx_findings_fingerprint
        ON findings(fingerprint);
    ";

    /// Open or create the history database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)?;
        Self::initialize(db)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(db: Connection) -> Result<Self, StoreError> {
        db.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        db.execute_batch(Self::SCHEMA)?;
        Ok(Self { db })
    }

    /// Persist one scan and all of its findings atomically.
    pub fn store_scan(&mut self, scan: &Scan, findings: &[Finding]) -> Result<(), StoreError> {
        let digest = findings_digest(findings);
        let scan_json = serde_json::to_string(scan)?;
        let branch = scan
            .git_context
            .as_ref()
            .and_then(|g| g.branch.as_deref());

        let tx = self.db.transaction()?;
        tx.execute(
            "INSERT INTO scans (scan_id, timestamp_ms, branch, outcome, duration_ms, findings_digest, scan_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                scan.scan_id,
                scan.timestamp_ms,
                branch,
                scan.outcome.to_string(),
                scan.duration_ms as i64,
                digest,
                scan_json,
            ],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO findings (scan_id, fingerprint, severity, rule_id, tool, path, finding_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for finding in findings {
                insert.execute(params![
                    scan.scan_id,
                    finding.id,
                    finding.severity.as_str(),
                    finding.rule_id,
                    finding.tool.name,
                    finding.location.path,
                    serde_json::to_string(finding)?,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(scan_id = %scan.scan_id, findings = findings.len(), "scan persisted");
        Ok(())
    }

    /// Newest-first scan listing, optionally filtered by branch.
    pub fn list_scans(
        &self,
        limit: usize,
        branch: Option<&str>,
    ) -> Result<Vec<ScanSummaryRow>, StoreError> {
        let sql = "SELECT scan_id, timestamp_ms, branch, outcome, duration_ms, scan_json,
                          (SELECT COUNT(*) FROM findings f WHERE f.scan_id = s.scan_id)
                   FROM scans s
                   WHERE (?1 IS NULL OR branch = ?1)
                   ORDER BY timestamp_ms DESC, scan_id DESC
                   LIMIT ?2";
        let mut stmt = self.db.prepare(sql)?;
        let rows = stmt.query_map(params![branch, limit as i64], |row| {
            let scan_json: String = row.get(5)?;
            Ok((
                ScanSummaryRow {
                    scan_id: row.get(0)?,
                    timestamp_ms: row.get(1)?,
                    branch: row.get(2)?,
                    outcome: row.get(3)?,
                    duration_ms: row.get::<_, i64>(4)? as u64,
                    summary: SeverityCounts::default(),
                    finding_count: row.get::<_, i64>(6)? as u64,
                },
                scan_json,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (mut summary_row, scan_json) = row?;
            if let Ok(scan) = serde_json::from_str::<Scan>(&scan_json) {
                summary_row.summary = scan.summary;
            }
            out.push(summary_row);
        }
        Ok(out)
    }

    /// Full scan record with its findings.
    pub fn get_scan(&self, scan_id: &str) -> Result<Option<(Scan, Vec<Finding>)>, StoreError> {
        let scan_json: Option<String> = self
            .db
            .query_row(
                "SELECT scan_json FROM scans WHERE scan_id = ?1",
                params![scan_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(scan_json) = scan_json else {
            return Ok(None);
        };
        let scan: Scan = serde_json::from_str(&scan_json)?;
        Ok(Some((scan, self.findings_for(scan_id)?)))
    }

    fn findings_for(&self, scan_id: &str) -> Result<Vec<Finding>, StoreError> {
        let mut stmt = self
            .db
            .prepare("SELECT finding_json FROM findings WHERE scan_id = ?1 ORDER BY fingerprint")?;
        let rows = stmt.query_map(params![scan_id], |row| row.get::<_, String>(0))?;
        let mut findings = Vec::new();
        for row in rows {
            findings.push(serde_json::from_str(&row?)?);
        }
        Ok(findings)
    }

    /// The two finding sets the diff engine needs. `None` when either scan
    /// is unknown.
    pub fn compare(
        &self,
        baseline_id: &str,
        current_id: &str,
    ) -> Result<Option<(Vec<Finding>, Vec<Finding>)>, StoreError> {
        if !self.scan_exists(baseline_id)? || !self.scan_exists(current_id)? {
            return Ok(None);
        }
        Ok(Some((
            self.findings_for(baseline_id)?,
            self.findings_for(current_id)?,
        )))
    }

    fn scan_exists(&self, scan_id: &str) -> Result<bool, StoreError> {
        let count: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM scans WHERE scan_id = ?1",
            params![scan_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Keep the newest `n` scans, delete the rest. Returns deleted count.
    pub fn prune_keep_last(&mut self, n: usize) -> Result<usize, StoreError> {
        let tx = self.db.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM scans WHERE scan_id NOT IN (
                 SELECT scan_id FROM scans ORDER BY timestamp_ms DESC, scan_id DESC LIMIT ?1
             )",
            params![n as i64],
        )?;
        tx.commit()?;
        Ok(deleted)
    }

    /// Delete scans older than `days`. Returns deleted count.
    pub fn prune_older_than_days(&mut self, days: u64, now_ms: i64) -> Result<usize, StoreError> {
        let cutoff = now_ms - (days as i64) * 24 * 3600 * 1000;
        let tx = self.db.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM scans WHERE timestamp_ms < ?1",
            params![cutoff],
        )?;
        tx.commit()?;
        Ok(deleted)
    }

    /// Reclaim space after pruning.
    pub fn vacuum(&self) -> Result<(), StoreError> {
        self.db.execute_batch("VACUUM")?;
        Ok(())
    }

    /// Integrity check: recompute each scan's fingerprint digest and compare
    /// with the stored one. Returns the ids of scans that fail.
    pub fn verify(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .db
            .prepare("SELECT scan_id, findings_digest FROM scans ORDER BY timestamp_ms")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut corrupt = Vec::new();
        for row in rows {
            let (scan_id, stored) = row?;
            let findings = self.findings_for(&scan_id)?;
            if findings_digest(&findings) != stored {
                corrupt.push(scan_id);
            }
        }
        Ok(corrupt)
    }
}

/// Order-independent digest over the set of fingerprints.
fn findings_digest(findings: &[Finding]) -> String {
    let mut ids: Vec<&str> = findings.iter().map(|f| f.id.as_str()).collect();
    ids.sort_unstable();
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::HistoryStore;
    use dragnet_types::{
        Finding, GitContext, Location, Priority, Scan, ScanOutcome, Severity, SeverityCounts,
        ToolRef,
    };

    fn scan(id: &str, timestamp_ms: i64, branch: Option<&str>) -> Scan {
        Scan {
            scan_id: id.to_string(),
            timestamp_ms,
            profile_name: "standard".to_string(),
            tools_requested: vec!["gitleaks".to_string()],
            targets: Vec::new(),
            git_context: branch.map(|b| GitContext {
                commit: Some("abc123".to_string()),
                branch: Some(b.to_string()),
                tag: None,
                dirty: false,
            }),
            summary: SeverityCounts::default(),
            duration_ms: 1000,
            outcome: ScanOutcome::Completed,
            attempts: std::collections::BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    fn finding(id: &str, severity: Severity) -> Finding {
        Finding {
            schema_version: dragnet_types::SCHEMA_VERSION.to_string(),
            id: id.to_string(),
            rule_id: "rule".to_string(),
            severity,
            tool: ToolRef::new("gitleaks", Some("8.21".to_string())),
            location: Location::new("src/a.py"),
            message: "m".to_string(),
            title: None,
            description: None,
            remediation: None,
            references: Vec::new(),
            tags: Vec::new(),
            cvss: None,
            context: None,
            compliance: dragnet_types::Compliance::default(),
            epss: None,
            kev: false,
            kev_due_date: None,
            priority: Priority::default(),
            detected_by: Vec::new(),
            raw: Vec::new(),
        }
    }

    #[test]
    fn store_and_get_roundtrip() {
        let mut store = HistoryStore::open_in_memory().unwrap();
        let findings = vec![finding("aa", Severity::High), finding("bb", Severity::Low)];
        store.store_scan(&scan("s1", 1000, Some("main")), &findings).unwrap();

        let (loaded_scan, loaded_findings) = store.get_scan("s1").unwrap().unwrap();
        assert_eq!(loaded_scan.scan_id, "s1");
        assert_eq!(loaded_findings.len(), 2);
        assert!(store.get_scan("nope").unwrap().is_none());
    }

    #[test]
    fn list_is_newest_first_with_branch_filter() {
        let mut store = HistoryStore::open_in_memory().unwrap();
        store.store_scan(&scan("old", 1000, Some("main")), &[]).unwrap();
        store.store_scan(&scan("new", 2000, Some("main")), &[]).unwrap();
        store.store_scan(&scan("dev", 1500, Some("feature")), &[]).unwrap();

        let all = store.list_scans(10, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].scan_id, "new");

        let main_only = store.list_scans(10, Some("main")).unwrap();
        assert_eq!(main_only.len(), 2);
    }

    #[test]
    fn compare_returns_both_sets() {
        let mut store = HistoryStore::open_in_memory().unwrap();
        store
            .store_scan(&scan("a", 1000, None), &[finding("x", Severity::High)])
            .unwrap();
        store
            .store_scan(&scan("b", 2000, None), &[finding("y", Severity::Low)])
            .unwrap();

        let (base, current) = store.compare("a", "b").unwrap().unwrap();
        assert_eq!(base[0].id, "x");
        assert_eq!(current[0].id, "y");
        assert!(store.compare("a", "missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_scan_id_rolls_back_whole_write() {
        let mut store = HistoryStore::open_in_memory().unwrap();
        store
            .store_scan(&scan("s1", 1000, None), &[finding("aa", Severity::High)])
            .unwrap();
        let err = store.store_scan(&scan("s1", 2000, None), &[finding("bb", Severity::Low)]);
        assert!(err.is_err());

        // The failed write must not have left finding rows behind.
        let (_, findings) = store.get_scan("s1").unwrap().unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].id, "aa");
    }

    #[test]
    fn prune_keep_last() {
        let mut store = HistoryStore::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .store_scan(&scan(&format!("s{i}"), 1000 + i, None), &[])
                .unwrap();
        }
        let deleted = store.prune_keep_last(2).unwrap();
        assert_eq!(deleted, 3);
        let remaining = store.list_scans(10, None).unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].scan_id, "s4");
    }

    #[test]
    fn prune_older_than_days() {
        let mut store = HistoryStore::open_in_memory().unwrap();
        let day_ms = 24 * 3600 * 1000;
        let now = 100 * day_ms;
        store.store_scan(&scan("ancient", day_ms, None), &[]).unwrap();
        store.store_scan(&scan("recent", 99 * day_ms, None), &[]).unwrap();

        let deleted = store.prune_older_than_days(30, now).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.list_scans(10, None).unwrap()[0].scan_id, "recent");
    }

    #[test]
    fn verify_detects_tampering() {
        let mut store = HistoryStore::open_in_memory().unwrap();
        store
            .store_scan(&scan("s1", 1000, None), &[finding("aa", Severity::High)])
            .unwrap();
        assert!(store.verify().unwrap().is_empty());

        store
            .db
            .execute("DELETE FROM findings WHERE fingerprint = 'aa'", [])
            .unwrap();
        assert_eq!(store.verify().unwrap(), vec!["s1".to_string()]);
    }

    #[test]
    fn vacuum_runs() {
        let mut store = HistoryStore::open_in_memory().unwrap();
        store.store_scan(&scan("s1", 1000, None), &[]).unwrap();
        store.prune_keep_last(0).unwrap();
        store.vacuum().unwrap();
    }
}
