//! trufflehog adapter (pinned 3.82).
//!
//! Output: newline-delimited JSON, one object per detected secret. Log lines
//! may be interleaved; the tolerant decoder already dropped those.
//!
//! Severity table: `Verified: true` means trufflehog confirmed the secret is
//! live against the provider API - CRITICAL. Unverified detections are HIGH.

use serde_json::Value;

use dragnet_types::{Severity, Target};

use crate::secret_class::class_for_trufflehog_detector;
use crate::{FindingShell, ParseOutput, flatten_documents};

pub(crate) fn parse(docs: &[Value], target: &Target, out: &mut ParseOutput) {
    for entry in flatten_documents(docs) {
        let Some(obj) = entry.as_object() else {
            out.warn("trufflehog", format!("skipping non-object entry: {entry}"));
            continue;
        };
        let Some(detector) = obj.get("DetectorName").and_then(Value::as_str) else {
            // trufflehog logs progress objects on stdout too; not findings.
            continue;
        };

        let verified = obj.get("Verified").and_then(Value::as_bool).unwrap_or(false);
        let (path, line) = location(entry, target);

        out.findings.push(FindingShell {
            rule_id: format!("trufflehog-{}", detector.to_ascii_lowercase()),
            severity: if verified {
                Severity::Critical
            } else {
                Severity::High
            },
            path,
            start_line: line,
            end_line: line,
            message: if verified {
                format!("verified live {detector} credential")
            } else {
                format!("potential {detector} credential")
            },
            title: Some(format!("{detector} secret")),
            remediation: Some(
                "Rotate the credential and purge it from history; keep secrets in a vault."
                    .to_string(),
            ),
            cwe: vec!["CWE-798".to_string()],
            consensus_key: class_for_trufflehog_detector(detector),
            raw: entry.clone(),
            ..FindingShell::default()
        });
    }
}

/// Location lives under `SourceMetadata.Data.<source>`; filesystem and git
/// sources carry different keys.
fn location(entry: &Value, target: &Target) -> (String, Option<u32>) {
    let data = entry.pointer("/SourceMetadata/Data");
    let fs = data.and_then(|d| d.get("Filesystem"));
    let git = data.and_then(|d| d.get("Git"));

    let path = fs
        .and_then(|f| f.get("file"))
        .or_else(|| git.and_then(|g| g.get("file")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| target.identifier());
    let line = fs
        .and_then(|f| f.get("line"))
        .or_else(|| git.and_then(|g| g.get("line")))
        .and_then(Value::as_u64)
        .map(|l| l as u32);
    (path, line)
}

#[cfg(test)]
mod tests {
    use super::super::{ToolKind, parse};
    use dragnet_types::{Severity, Target};

    fn repo() -> Target {
        Target::Repo {
            path: "/tmp/app".into(),
        }
    }

    #[test]
    fn parses_ndjson_with_verification_split() {
        let raw = concat!(
            r#"{"DetectorName":"AWS","Verified":true,"SourceMetadata":{"Data":{"Filesystem":{"file":"src/secret.py","line":3}}}}"#,
            "\n",
            r#"{"DetectorName":"Slack","Verified":false,"SourceMetadata":{"Data":{"Filesystem":{"file":"ops/deploy.sh","line":9}}}}"#,
            "\n",
        );
        let out = parse(ToolKind::Trufflehog, raw.as_bytes(), &repo());
        assert_eq!(out.findings.len(), 2);
        assert_eq!(out.findings[0].severity, Severity::Critical);
        assert_eq!(out.findings[0].rule_id, "trufflehog-aws");
        assert_eq!(out.findings[0].start_line, Some(3));
        assert_eq!(out.findings[1].severity, Severity::High);
    }

    #[test]
    fn progress_objects_are_ignored() {
        let raw = br#"{"level":"info","msg":"scanning 42 chunks"}"#;
        let out = parse(ToolKind::Trufflehog, raw, &repo());
        assert!(out.findings.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn truncated_final_record_keeps_prefix() {
        let raw = concat!(
            r#"{"DetectorName":"AWS","Verified":false,"SourceMetadata":{"Data":{"Filesystem":{"file":"a.py","line":1}}}}"#,
            "\n",
            r#"{"DetectorName":"Git"#,
        );
        let out = parse(ToolKind::Trufflehog, raw.as_bytes(), &repo());
        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.warnings.len(), 1);
    }
}
