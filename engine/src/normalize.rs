//! The normalizer: finding shells -> canonical findings.
//!
//! Stamps schema version, identity (fingerprint), and tool provenance;
//! relativizes paths against the target root; rejects shells missing the
//! fields identity depends on. The shell's raw payload passes through
//! untouched.

use dragnet_adapters::FindingShell;
use dragnet_types::{
    Compliance, Finding, Location, Priority, SCHEMA_VERSION, Target, ToolRef, fingerprint,
    fingerprint_consensus, normalize_path,
};

/// Result of normalizing one shell.
#[derive(Debug)]
pub enum NormalizeOutcome {
    Finding(Box<Finding>),
    /// The shell was missing a field identity depends on.
    Rejected { reason: String },
}

/// Normalize one shell from `tool` scanning `target`.
///
/// Normalization is idempotent: feeding an emitted finding's fields back
/// through produces an equal record, because the canonical path and the
/// fingerprint are both fixed points.
#[must_use]
pub fn normalize_shell(tool: &ToolRef, target: &Target, shell: FindingShell) -> NormalizeOutcome {
    if shell.rule_id.trim().is_empty() {
        return NormalizeOutcome::Rejected {
            reason: format!("{}: finding without rule_id", tool.name),
        };
    }
    if shell.path.trim().is_empty() {
        return NormalizeOutcome::Rejected {
            reason: format!("{}: finding {} without location", tool.name, shell.rule_id),
        };
    }
    if shell.message.trim().is_empty() {
        return NormalizeOutcome::Rejected {
            reason: format!("{}: finding {} without message", tool.name, shell.rule_id),
        };
    }

    let path = canonical_path(&shell.path, target);
    // Shared-class detections fingerprint on the class so two tools
    // reporting the same secret collapse into one finding at dedup.
    let id = match &shell.consensus_key {
        Some(key) => fingerprint_consensus(key, &path, shell.start_line),
        None => fingerprint(
            &tool.name,
            &shell.rule_id,
            &path,
            shell.start_line,
            &shell.message,
        ),
    };

    NormalizeOutcome::Finding(Box::new(Finding {
        schema_version: SCHEMA_VERSION.to_string(),
        id,
        rule_id: shell.rule_id,
        severity: shell.severity,
        tool: tool.clone(),
        location: Location {
            path,
            start_line: shell.start_line,
            end_line: shell.end_line,
        },
        message: shell.message,
        title: shell.title,
        description: shell.description,
        remediation: shell.remediation,
        references: shell.references,
        tags: shell.tags,
        cvss: shell.cvss,
        context: shell.context,
        compliance: Compliance {
            cwe: shell.cwe,
            ..Compliance::default()
        },
        epss: None,
        kev: false,
        kev_due_date: None,
        priority: Priority::default(),
        detected_by: vec![tool.clone()],
        raw: vec![shell.raw],
    }))
}

/// Repo-relative POSIX path for file targets; the identifier itself for
/// image/URL/cluster targets.
fn canonical_path(raw_path: &str, target: &Target) -> String {
    let normalized = normalize_path(raw_path);
    let Some(root) = target.root() else {
        return normalized;
    };
    let root = normalize_path(&root.display().to_string());
    if root.is_empty() {
        return normalized;
    }
    match normalized.strip_prefix(&root) {
        Some(rest) => {
            let rest = rest.trim_start_matches('/');
            if rest.is_empty() {
                normalized
            } else {
                rest.to_string()
            }
        }
        None => normalized,
    }
}
