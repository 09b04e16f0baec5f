//! The canonical finding record.
//!
//! Adapters produce partially-filled findings; the normalizer stamps identity
//! and provenance; enrichment attaches EPSS/KEV, compliance mappings and the
//! priority score; dedup merges records sharing a fingerprint. The `raw`
//! payload is owned by the originating tool and is never modified after
//! parsing - everything derived lives in separate fields.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fingerprint::Fingerprint;
use crate::severity::Severity;

/// Identity of the tool a finding came from. A missing version is recorded
/// as `None` and serialized as an explicit `null`, never elided.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolRef {
    pub name: String,
    pub version: Option<String>,
}

impl ToolRef {
    #[must_use]
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

/// Where a finding lives. For non-file targets (images, URLs, clusters) the
/// path carries the target identifier instead of a repo-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
}

impl Location {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            start_line: None,
            end_line: None,
        }
    }

    #[must_use]
    pub fn with_lines(path: impl Into<String>, start: u32, end: Option<u32>) -> Self {
        Self {
            path: path.into(),
            start_line: Some(start),
            end_line: end,
        }
    }
}

/// CVSS vector attached by tools that report one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cvss {
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<String>,
}

/// Per-framework compliance mappings. Empty arrays mean "no mapping known",
/// which is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compliance {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cwe: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owasp_top10: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cwe_top25: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cis: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nist_csf: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pci_dss: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mitre_attack: Vec<String>,
}

impl Compliance {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cwe.is_empty()
            && self.owasp_top10.is_empty()
            && self.cwe_top25.is_empty()
            && self.cis.is_empty()
            && self.nist_csf.is_empty()
            && self.pci_dss.is_empty()
            && self.mitre_attack.is_empty()
    }
}

/// EPSS exploitation-probability data for CVE-bearing findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epss {
    /// Probability of exploitation within 30 days, in [0, 1].
    pub score: f64,
    /// Percentile rank among all scored CVEs, in [0, 1].
    pub percentile: f64,
}

/// The additive terms the priority score was computed from. The score is
/// reproducible as `min(100, round(sum of components))`, raised to 90 when
/// `kev_multiplier > 0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityComponents {
    pub severity_score: f64,
    pub epss_multiplier: f64,
    pub kev_multiplier: f64,
    pub reachability_multiplier: f64,
}

impl PriorityComponents {
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.severity_score + self.epss_multiplier + self.kev_multiplier
            + self.reachability_multiplier
    }
}

/// Priority score in [0, 100] with its contributing components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Priority {
    pub score: u8,
    pub components: PriorityComponents,
}

/// The canonical record produced by the normalizer and carried through
/// enrichment, dedup, suppression, and every sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub schema_version: String,
    /// Stable fingerprint; equal ids are the same defect.
    pub id: Fingerprint,
    pub rule_id: String,
    pub severity: Severity,
    pub tool: ToolRef,
    pub location: Location,
    /// Human-readable single sentence.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvss: Option<Cvss>,
    /// Source snippet around the finding, when the tool provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Compliance::is_empty")]
    pub compliance: Compliance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epss: Option<Epss>,
    #[serde(default)]
    pub kev: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kev_due_date: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    /// Distinct (tool, version) pairs that reported this defect. Populated
    /// by the deduplicator; always contains at least the originating tool.
    #[serde(default)]
    pub detected_by: Vec<ToolRef>,
    /// Opaque original payload(s) from the tool(s). Never modified.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw: Vec<Value>,
}

impl Finding {
    /// Canonical ordering: severity desc, priority desc, path asc,
    /// rule_id asc, fingerprint asc.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        other
            .severity
            .cmp(&self.severity)
            .then_with(|| other.priority.score.cmp(&self.priority.score))
            .then_with(|| self.location.path.cmp(&other.location.path))
            .then_with(|| self.rule_id.cmp(&other.rule_id))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Apply the deterministic emit-time ordering. The pipeline is
/// order-independent up to this point; this sort defines the output order.
pub fn sort_canonical(findings: &mut [Finding]) {
    findings.sort_by(Finding::canonical_cmp);
}
