//! The findings envelope: `summaries/findings.json`.

use serde::{Deserialize, Serialize};

use dragnet_types::{Finding, Scan};

use crate::OUTPUT_VERSION;

/// `meta` block of the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    pub output_version: String,
    /// The dragnet version that produced the report.
    pub tool_version: String,
    pub schema_version: String,
    /// ISO 8601 scan start.
    pub timestamp: String,
    pub scan_id: String,
    pub profile: String,
    pub tools: Vec<String>,
    pub target_count: usize,
    pub finding_count: usize,
    pub platform: String,
}

/// The full envelope: `{meta, findings[]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub meta: EnvelopeMeta,
    pub findings: Vec<Finding>,
}

/// Assemble the envelope for one scan.
#[must_use]
pub fn build_envelope(scan: &Scan, findings: &[Finding]) -> Envelope {
    Envelope {
        meta: EnvelopeMeta {
            output_version: OUTPUT_VERSION.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            schema_version: dragnet_types::SCHEMA_VERSION.to_string(),
            timestamp: iso8601(scan.timestamp_ms),
            scan_id: scan.scan_id.clone(),
            profile: scan.profile_name.clone(),
            tools: scan.tools_requested.clone(),
            target_count: scan.targets.len(),
            finding_count: findings.len(),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        },
        findings: findings.to_vec(),
    }
}

pub(crate) fn iso8601(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}
