//! Scan metadata: one record per invocation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::severity::Severity;
use crate::target::Target;

/// Terminal state of a whole scan, summarizing per-job terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanOutcome {
    /// Every job reached a terminal non-fatal outcome.
    Completed,
    /// At least one job failed after exhausting its retries.
    Partial,
    /// Infrastructure failure (e.g. primary output sink unwritable).
    Failed,
    /// Cancellation was requested and honored; partial results preserved.
    Cancelled,
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScanOutcome::Completed => "completed",
            ScanOutcome::Partial => "partial",
            ScanOutcome::Failed => "failed",
            ScanOutcome::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Counts by severity, the summary attached to every scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub info: u64,
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Info => self.info += 1,
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
            Severity::Critical => self.critical += 1,
        }
    }

    #[must_use]
    pub fn get(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Info => self.info,
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.info + self.low + self.medium + self.high + self.critical
    }

    /// Count of findings at or above the given severity; drives CI gating.
    #[must_use]
    pub fn at_or_above(&self, floor: Severity) -> u64 {
        Severity::ALL
            .iter()
            .filter(|s| **s >= floor)
            .map(|s| self.get(*s))
            .sum()
    }
}

/// Git state captured at scan start when the primary target is a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub dirty: bool,
}

/// One scan invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    /// Opaque unique token.
    pub scan_id: String,
    /// Wall-clock start, Unix epoch milliseconds. Scan-id ordering follows
    /// this timestamp with the id itself as tie-breaker.
    pub timestamp_ms: i64,
    pub profile_name: String,
    pub tools_requested: Vec<String>,
    pub targets: Vec<Target>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_context: Option<GitContext>,
    pub summary: SeverityCounts,
    pub duration_ms: u64,
    pub outcome: ScanOutcome,
    /// Attempts per tool, including retries (spec: `attempts = {tool: n}`).
    #[serde(default)]
    pub attempts: BTreeMap<String, u32>,
    /// Target-validation and parse warnings surfaced to the user.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
