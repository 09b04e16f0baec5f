//! Per-tool output parsers.
//!
//! One adapter per scanner, all behind the same contract:
//! `parse(tool, raw_bytes, target) -> shells + warnings`. Adapters are
//! tolerant by design - empty output, a single JSON object, a JSON array,
//! newline-delimited JSON, and truncated trailing records all decode to
//! "whatever was valid, plus a warning". A well-formed-but-unexpected shape
//! returns an empty list and a warning, never an error.
//!
//! Severity mapping tables live with each adapter and are written against
//! the tool version pinned in the catalog.

mod bandit;
mod checkov;
mod gitleaks;
mod grype;
mod hadolint;
mod kube_bench;
mod nuclei;
mod payload;
mod secret_class;
mod semgrep;
mod syft;
mod trivy;
mod trufflehog;

use serde_json::Value;

use dragnet_tools::ToolKind;
use dragnet_types::{Cvss, Severity, Target};

pub use payload::{decode_documents, flatten_documents};

/// A finding as one tool reported it, before normalization. Paths are still
/// tool-native; identity and provenance are stamped by the normalizer.
#[derive(Debug, Clone, Default)]
pub struct FindingShell {
    pub rule_id: String,
    pub severity: Severity,
    pub path: String,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub message: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub remediation: Option<String>,
    pub references: Vec<String>,
    pub tags: Vec<String>,
    pub cvss: Option<Cvss>,
    pub context: Option<String>,
    pub cwe: Vec<String>,
    /// Cross-tool identity for defect classes several tools detect (e.g.
    /// `secret:aws`). When set, the fingerprint is computed from this key
    /// instead of the tool-specific rule, so the deduplicator can merge
    /// detections across tools.
    pub consensus_key: Option<String>,
    /// The original payload for this finding. Preserved verbatim.
    pub raw: Value,
}

/// A non-fatal problem encountered while parsing one tool's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    pub tool: &'static str,
    pub message: String,
}

/// Result of parsing one raw tool payload.
#[derive(Debug, Default)]
pub struct ParseOutput {
    pub findings: Vec<FindingShell>,
    pub warnings: Vec<ParseWarning>,
}

impl ParseOutput {
    pub(crate) fn warn(&mut self, tool: &'static str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(tool, "{message}");
        self.warnings.push(ParseWarning { tool, message });
    }
}

/// Parse one tool's raw stdout into finding shells.
///
/// This is the single dispatch point for the closed adapter set; adding a
/// tool means adding a module and an arm here.
#[must_use]
pub fn parse(tool: ToolKind, raw: &[u8], target: &Target) -> ParseOutput {
    let mut out = ParseOutput::default();
    let docs = match prepare_documents(tool, raw, &mut out) {
        Some(docs) => docs,
        None => return out,
    };
    match tool {
        ToolKind::Gitleaks => gitleaks::parse(&docs, target, &mut out),
        ToolKind::Trufflehog => trufflehog::parse(&docs, target, &mut out),
        ToolKind::Semgrep => semgrep::parse(&docs, target, &mut out),
        ToolKind::Bandit => bandit::parse(&docs, target, &mut out),
        ToolKind::Trivy => trivy::parse(&docs, target, &mut out),
        ToolKind::Grype => grype::parse(&docs, target, &mut out),
        ToolKind::Syft => syft::parse(&docs, target, &mut out),
        ToolKind::Checkov => checkov::parse(&docs, target, &mut out),
        ToolKind::Hadolint => hadolint::parse(&docs, target, &mut out),
        ToolKind::Nuclei => nuclei::parse(&docs, target, &mut out),
        ToolKind::KubeBench => kube_bench::parse(&docs, target, &mut out),
    }
    out
}

/// Shared decode preamble: empty output is fine, undecodable output is a
/// warning, partially-decodable output keeps the valid prefix.
fn prepare_documents(tool: ToolKind, raw: &[u8], out: &mut ParseOutput) -> Option<Vec<Value>> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    let (docs, truncated) = decode_documents(raw);
    if truncated {
        out.warn(
            tool_name(tool),
            "output ended mid-record; trailing data discarded",
        );
    }
    if docs.is_empty() {
        out.warn(tool_name(tool), "output was not valid JSON");
        return None;
    }
    Some(docs)
}

pub(crate) fn tool_name(tool: ToolKind) -> &'static str {
    tool.name()
}

#[cfg(test)]
mod tests {
    use super::{parse, ToolKind};
    use dragnet_types::Target;

    fn repo() -> Target {
        Target::Repo {
            path: "/tmp/app".into(),
        }
    }

    #[test]
    fn empty_output_is_clean_for_every_tool() {
        for tool in ToolKind::ALL {
            let out = parse(tool, b"", &repo());
            assert!(out.findings.is_empty(), "{tool}");
            assert!(out.warnings.is_empty(), "{tool}");
        }
    }

    #[test]
    fn garbage_output_warns_for_every_tool() {
        for tool in ToolKind::ALL {
            let out = parse(tool, b"PANIC: not json at all", &repo());
            assert!(out.findings.is_empty(), "{tool}");
            assert!(!out.warnings.is_empty(), "{tool}");
        }
    }

    #[test]
    fn unexpected_but_valid_shape_is_empty_plus_warning() {
        // A bare number is valid JSON but no adapter's expected shape.
        for tool in ToolKind::ALL {
            let out = parse(tool, b"42", &repo());
            assert!(out.findings.is_empty(), "{tool}");
        }
    }
}
