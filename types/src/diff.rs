//! Scan-to-scan diff data model.
//!
//! The diff engine itself lives in the history crate; these are the shapes
//! it produces and the report sinks render.

use serde::{Deserialize, Serialize};

use crate::finding::Finding;
use crate::scan::SeverityCounts;

/// Filtering options for a diff run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    /// Only consider findings at or above this severity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_severity: Option<crate::Severity>,
    /// Only consider findings from these tools (empty = all).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    /// When false, shared fingerprints are all classified `unchanged`.
    #[serde(default = "default_true")]
    pub detect_modifications: bool,
}

fn default_true() -> bool {
    true
}

/// Coarse risk movement for a modified finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskDelta {
    Improved,
    Worsened,
    Unchanged,
}

/// One attribute that changed between baseline and current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: String,
    pub new: String,
}

/// A finding present in both scans with at least one tracked attribute changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedFinding {
    pub finding: Finding,
    pub changes: Vec<FieldChange>,
    pub risk_delta: RiskDelta,
}

/// Overall movement label derived from net new minus resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Improving,
    Stable,
    Worsening,
}

/// Thresholds for the trend label: the net introduction count at which the
/// label flips away from `stable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendThresholds {
    pub worsening_net_new: i64,
    pub improving_net_resolved: i64,
}

impl Default for TrendThresholds {
    fn default() -> Self {
        Self {
            worsening_net_new: 1,
            improving_net_resolved: 1,
        }
    }
}

/// Full classification of two scans by fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanDiff {
    pub new: Vec<Finding>,
    pub resolved: Vec<Finding>,
    pub modified: Vec<ModifiedFinding>,
    pub unchanged: Vec<Finding>,
    pub new_counts: SeverityCounts,
    pub resolved_counts: SeverityCounts,
    pub trend: Option<TrendLabel>,
}

impl ScanDiff {
    /// Net movement: positive means findings were introduced.
    #[must_use]
    pub fn net_new(&self) -> i64 {
        self.new.len() as i64 - self.resolved.len() as i64
    }

    /// Net risk movement: new minus resolved, with each worsened
    /// modification counting as an introduction and each improved one as a
    /// resolution. A finding that escalated from HIGH to CRITICAL is new
    /// pressure even though its fingerprint survived.
    #[must_use]
    pub fn net_pressure(&self) -> i64 {
        let worsened = self
            .modified
            .iter()
            .filter(|m| m.risk_delta == RiskDelta::Worsened)
            .count() as i64;
        let improved = self
            .modified
            .iter()
            .filter(|m| m.risk_delta == RiskDelta::Improved)
            .count() as i64;
        self.net_new() + worsened - improved
    }

    /// Derive the trend label from net risk movement against thresholds.
    #[must_use]
    pub fn trend_label(&self, thresholds: TrendThresholds) -> TrendLabel {
        let net = self.net_pressure();
        if net >= thresholds.worsening_net_new {
            TrendLabel::Worsening
        } else if -net >= thresholds.improving_net_resolved {
            TrendLabel::Improving
        } else {
            TrendLabel::Stable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldChange, ModifiedFinding, RiskDelta, ScanDiff, TrendLabel, TrendThresholds};

    fn modified(id: &str, risk_delta: RiskDelta) -> ModifiedFinding {
        ModifiedFinding {
            finding: crate::finding::tests::sample(id, crate::Severity::Critical, "x.rs"),
            changes: vec![FieldChange {
                field: "severity".to_string(),
                old: "HIGH".to_string(),
                new: "CRITICAL".to_string(),
            }],
            risk_delta,
        }
    }

    #[test]
    fn trend_label_thresholds() {
        let mut diff = ScanDiff::default();
        assert_eq!(
            diff.trend_label(TrendThresholds::default()),
            TrendLabel::Stable
        );

        diff.new.push(crate::finding::tests::sample(
            "aa",
            crate::Severity::Low,
            "a.rs",
        ));
        assert_eq!(
            diff.trend_label(TrendThresholds::default()),
            TrendLabel::Worsening
        );

        diff.resolved.push(crate::finding::tests::sample(
            "bb",
            crate::Severity::Low,
            "b.rs",
        ));
        diff.resolved.push(crate::finding::tests::sample(
            "cc",
            crate::Severity::Low,
            "c.rs",
        ));
        assert_eq!(
            diff.trend_label(TrendThresholds::default()),
            TrendLabel::Improving
        );
    }

    #[test]
    fn worsened_modification_counts_as_pressure() {
        // One new, one resolved, one escalation: the escalation tips the
        // balance even though the fingerprint count is flat.
        let mut diff = ScanDiff::default();
        diff.new
            .push(crate::finding::tests::sample("aa", crate::Severity::Low, "a.rs"));
        diff.resolved
            .push(crate::finding::tests::sample("bb", crate::Severity::Medium, "b.rs"));
        diff.modified.push(modified("cc", RiskDelta::Worsened));

        assert_eq!(diff.net_new(), 0);
        assert_eq!(diff.net_pressure(), 1);
        assert_eq!(
            diff.trend_label(TrendThresholds::default()),
            TrendLabel::Worsening
        );
    }

    #[test]
    fn improved_modification_counts_as_relief() {
        let mut diff = ScanDiff::default();
        diff.modified.push(modified("aa", RiskDelta::Improved));
        diff.modified.push(modified("bb", RiskDelta::Unchanged));

        assert_eq!(diff.net_pressure(), -1);
        assert_eq!(
            diff.trend_label(TrendThresholds::default()),
            TrendLabel::Improving
        );
    }
}
