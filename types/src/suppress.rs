//! Suppression rules.
//!
//! A rule removes matching findings from the emitted stream while preserving
//! an audit record. Rules are evaluated in definition order, first match
//! wins, and an expired rule is inert. The glob compilation and matching
//! pass live in the engine; this module owns the rule data and the
//! non-glob match criteria.

use serde::{Deserialize, Serialize};

use crate::finding::Finding;
use crate::severity::Severity;

/// A user-defined suppression rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionRule {
    pub id: String,
    /// Tool name to match; `None` matches any tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Rule id to match, exact; `None` matches any rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Glob over the normalized finding path; `None` matches any path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_glob: Option<String>,
    /// Only findings at or below this severity match; `None` matches all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_max: Option<Severity>,
    pub reason: String,
    /// ISO 8601 date (`YYYY-MM-DD`); the rule is inert on and after this day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

impl SuppressionRule {
    /// Whether the rule has expired relative to `today` (`YYYY-MM-DD`).
    /// ISO dates compare correctly as strings.
    #[must_use]
    pub fn is_expired(&self, today: &str) -> bool {
        self.expires.as_deref().is_some_and(|expiry| expiry <= today)
    }

    /// The non-glob criteria. The caller is responsible for the
    /// `path_glob` check and for skipping expired rules.
    #[must_use]
    pub fn matches_except_path(&self, finding: &Finding) -> bool {
        if let Some(tool) = &self.tool
            && tool != &finding.tool.name
        {
            return false;
        }
        if let Some(rule_id) = &self.rule_id
            && rule_id != &finding.rule_id
        {
            return false;
        }
        if let Some(max) = self.severity_max
            && finding.severity > max
        {
            return false;
        }
        true
    }
}

/// Audit record for one suppressed finding: which rule claimed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressionMatch {
    pub rule_id: String,
    pub reason: String,
    pub finding: Finding,
}
