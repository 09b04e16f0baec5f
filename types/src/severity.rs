//! Canonical severity scale shared by every finding.
//!
//! The ordering is total (`Info < Low < Medium < High < Critical`) and is
//! relied on by dedup merging, priority scoring, CI gating, and report sorting.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of a finding on the canonical five-point scale.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Base numeric value used by the priority formula (0..=10).
    #[must_use]
    pub fn base_score(self) -> f64 {
        match self {
            Severity::Info => 1.0,
            Severity::Low => 3.0,
            Severity::Medium => 5.0,
            Severity::High => 8.0,
            Severity::Critical => 10.0,
        }
    }

    /// Map a CVSS base score (0.0..=10.0) onto the canonical scale.
    #[must_use]
    pub fn from_cvss(score: f64) -> Self {
        if score >= 9.0 {
            Severity::Critical
        } else if score >= 7.0 {
            Severity::High
        } else if score >= 4.0 {
            Severity::Medium
        } else if score > 0.0 {
            Severity::Low
        } else {
            Severity::Info
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown severity label: {0:?}")]
pub struct SeverityParseError(pub String);

impl FromStr for Severity {
    type Err = SeverityParseError;

    /// Case-insensitive parse of the canonical labels plus the common
    /// aliases tools emit (`moderate`, `important`, `negligible`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFO" | "INFORMATIONAL" | "NOTE" | "NEGLIGIBLE" | "UNKNOWN" | "NONE" => {
                Ok(Severity::Info)
            }
            "LOW" | "MINOR" | "STYLE" => Ok(Severity::Low),
            "MEDIUM" | "MODERATE" | "WARNING" | "WARN" => Ok(Severity::Medium),
            "HIGH" | "IMPORTANT" | "ERROR" | "MAJOR" => Ok(Severity::High),
            "CRITICAL" | "BLOCKER" | "FATAL" => Ok(Severity::Critical),
            other => Err(SeverityParseError(other.to_string())),
        }
    }
}
