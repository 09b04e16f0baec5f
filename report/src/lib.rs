//! Report sinks.
//!
//! A scan always produces `summaries/findings.json` (the primary sink) and
//! `SUMMARY.md`; everything else is secondary and degrades to a logged
//! warning. Rendering beyond these machine formats and markdown (HTML
//! dashboards and the like) plugs in externally on top of the findings
//! envelope.

mod envelope;
mod raw;
mod sarif;
mod summary;
mod suppressions;
mod timings;

use std::path::{Path, PathBuf};

use dragnet_types::{Finding, Scan, SuppressionMatch};

pub use envelope::{Envelope, EnvelopeMeta, build_envelope};
pub use raw::RawPayload;
pub use sarif::BaselineStates;
pub use timings::JobTiming;

/// Version of the on-disk report layout.
pub const OUTPUT_VERSION: &str = "1";

/// Writes one scan's reports under a results root.
pub struct ReportWriter {
    root: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The primary sink failed; the scan cannot be said to have produced
    /// output. This is the only report error that aborts a scan.
    #[error("failed to write primary report {path}")]
    PrimarySink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything the writer renders.
pub struct ReportInputs<'a> {
    pub scan: &'a Scan,
    pub findings: &'a [Finding],
    pub suppressed: &'a [SuppressionMatch],
    pub unused_rules: &'a [String],
    /// Per-job timings; present only when profiling is enabled.
    pub timings: Option<&'a [JobTiming]>,
    pub raw_payloads: &'a [RawPayload],
    /// Fingerprint -> SARIF baselineState, when this is a comparison run.
    pub baseline: Option<&'a BaselineStates>,
}

impl ReportWriter {
    #[must_use]
    pub fn new(results_root: impl Into<PathBuf>) -> Self {
        Self {
            root: results_root.into(),
        }
    }

    #[must_use]
    pub fn summaries_dir(&self) -> PathBuf {
        self.root.join("summaries")
    }

    /// Write every sink. Only a primary-sink failure is an error; secondary
    /// sinks log and continue so one bad path cannot cost the scan its
    /// output.
    pub fn write_all(&self, inputs: &ReportInputs<'_>) -> Result<(), ReportError> {
        let summaries = self.summaries_dir();

        let envelope = build_envelope(inputs.scan, inputs.findings);
        let findings_path = summaries.join("findings.json");
        let bytes = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| ReportError::PrimarySink {
                path: findings_path.clone(),
                source: std::io::Error::other(e),
            })?;
        dragnet_utils::atomic_write(&findings_path, &bytes).map_err(|source| {
            ReportError::PrimarySink {
                path: findings_path.clone(),
                source,
            }
        })?;

        self.secondary(&summaries.join("SUMMARY.md"), || {
            summary::render(inputs.scan, inputs.findings).into_bytes()
        });
        self.secondary(&summaries.join("findings.sarif"), || {
            sarif::render(inputs.scan, inputs.findings, inputs.baseline)
        });
        if !inputs.suppressed.is_empty() {
            self.secondary(&summaries.join("SUPPRESSIONS.md"), || {
                suppressions::render(inputs.suppressed, inputs.unused_rules).into_bytes()
            });
        }
        if let Some(timings) = inputs.timings {
            self.secondary(&summaries.join("timings.json"), || {
                serde_json::to_vec_pretty(timings).unwrap_or_default()
            });
        }
        for payload in inputs.raw_payloads {
            self.secondary(&raw::payload_path(&self.root, payload), || {
                payload.bytes.clone()
            });
        }

        Ok(())
    }

    fn secondary(&self, path: &Path, render: impl FnOnce() -> Vec<u8>) {
        if let Err(e) = dragnet_utils::atomic_write(path, &render()) {
            tracing::warn!(path = %path.display(), "secondary report sink failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ReportInputs, ReportWriter};
    use dragnet_types::{
        Finding, Location, Priority, Scan, ScanOutcome, Severity, SeverityCounts, ToolRef,
    };

    fn scan() -> Scan {
        Scan {
            scan_id: "testscan".to_string(),
            timestamp_ms: 1_750_000_000_000,
            profile_name: "fast".to_string(),
            tools_requested: vec!["gitleaks".to_string()],
            targets: Vec::new(),
            git_context: None,
            summary: SeverityCounts::default(),
            duration_ms: 1234,
            outcome: ScanOutcome::Completed,
            attempts: std::collections::BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    fn finding() -> Finding {
        Finding {
            schema_version: dragnet_types::SCHEMA_VERSION.to_string(),
            id: "deadbeef".to_string(),
            rule_id: "aws-access-token".to_string(),
            severity: Severity::High,
            tool: ToolRef::new("gitleaks", Some("8.21".to_string())),
            location: Location::with_lines("src/secret.py", 3, Some(3)),
            message: "AWS Access Key detected".to_string(),
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
            detected_by: vec![ToolRef::new("gitleaks", Some("8.21".to_string()))],
            raw: Vec::new(),
        }
    }

    #[test]
    fn write_all_produces_primary_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let scan = scan();
        let findings = vec![finding()];
        writer
            .write_all(&ReportInputs {
                scan: &scan,
                findings: &findings,
                suppressed: &[],
                unused_rules: &[],
                timings: None,
                raw_payloads: &[],
                baseline: None,
            })
            .unwrap();

        let summaries = dir.path().join("summaries");
        assert!(summaries.join("findings.json").exists());
        assert!(summaries.join("SUMMARY.md").exists());
        assert!(summaries.join("findings.sarif").exists());
        assert!(
            !summaries.join("SUPPRESSIONS.md").exists(),
            "absent when nothing suppressed"
        );
        assert!(!summaries.join("timings.json").exists());
    }

    #[test]
    fn empty_scan_still_writes_findings_json() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let scan = scan();
        writer
            .write_all(&ReportInputs {
                scan: &scan,
                findings: &[],
                suppressed: &[],
                unused_rules: &[],
                timings: None,
                raw_payloads: &[],
                baseline: None,
            })
            .unwrap();

        let content =
            std::fs::read_to_string(dir.path().join("summaries/findings.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["findings"].as_array().unwrap().len(), 0);
        assert_eq!(parsed["meta"]["finding_count"], 0);

        let summary = std::fs::read_to_string(dir.path().join("summaries/SUMMARY.md")).unwrap();
        assert!(summary.contains("Total findings: 0"));
    }

    #[test]
    fn unwritable_primary_sink_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // Occupy summaries/findings.json's parent with a file.
        std::fs::write(dir.path().join("summaries"), b"not a dir").unwrap();
        let writer = ReportWriter::new(dir.path());
        let scan = scan();
        let result = writer.write_all(&ReportInputs {
            scan: &scan,
            findings: &[],
            suppressed: &[],
            unused_rules: &[],
            timings: None,
            raw_payloads: &[],
            baseline: None,
        });
        assert!(result.is_err());
    }
}
