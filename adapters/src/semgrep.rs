//! semgrep adapter (pinned 1.96).
//!
//! Output: a single JSON object `{results: [...], errors: [...]}`.
//!
//! Severity table (semgrep label -> canonical):
//!
//! | semgrep | canonical |
//! |---------|-----------|
//! | ERROR   | HIGH      |
//! | WARNING | MEDIUM    |
//! | INFO    | LOW       |
//!
//! Unknown labels map to MEDIUM with a warning; label sets have drifted
//! across semgrep releases.

use serde_json::Value;

use dragnet_types::{Severity, Target};

use crate::{FindingShell, ParseOutput};

fn map_severity(label: &str, out: &mut ParseOutput) -> Severity {
    match label.to_ascii_uppercase().as_str() {
        "ERROR" => Severity::High,
        "WARNING" => Severity::Medium,
        "INFO" => Severity::Low,
        other => {
            out.warn("semgrep", format!("unknown severity label {other:?}"));
            Severity::Medium
        }
    }
}

pub(crate) fn parse(docs: &[Value], _target: &Target, out: &mut ParseOutput) {
    for doc in docs {
        let Some(results) = doc.get("results").and_then(Value::as_array) else {
            out.warn("semgrep", "document has no results array");
            continue;
        };

        for result in results {
            let Some(check_id) = result.get("check_id").and_then(Value::as_str) else {
                out.warn("semgrep", "result missing check_id; skipped");
                continue;
            };
            let Some(path) = result.get("path").and_then(Value::as_str) else {
                out.warn("semgrep", format!("result {check_id} missing path; skipped"));
                continue;
            };

            let extra = result.get("extra");
            let severity_label = extra
                .and_then(|e| e.get("severity"))
                .and_then(Value::as_str)
                .unwrap_or("WARNING");
            let message = extra
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("semgrep rule matched");
            let metadata = extra.and_then(|e| e.get("metadata"));

            let cwe = string_list(metadata.and_then(|m| m.get("cwe")))
                .into_iter()
                .map(|c| normalize_cwe(&c))
                .collect();
            let references = string_list(metadata.and_then(|m| m.get("references")));
            let owasp = string_list(metadata.and_then(|m| m.get("owasp")));
            let severity = map_severity(severity_label, out);

            out.findings.push(FindingShell {
                rule_id: check_id.to_string(),
                severity,
                path: path.to_string(),
                start_line: result
                    .pointer("/start/line")
                    .and_then(Value::as_u64)
                    .map(|l| l as u32),
                end_line: result
                    .pointer("/end/line")
                    .and_then(Value::as_u64)
                    .map(|l| l as u32),
                message: first_sentence(message),
                description: Some(message.to_string()),
                remediation: extra
                    .and_then(|e| e.get("fix"))
                    .and_then(Value::as_str)
                    .map(|f| format!("Apply the suggested fix: {f}")),
                references,
                tags: owasp,
                context: extra
                    .and_then(|e| e.get("lines"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                cwe,
                raw: result.clone(),
                ..FindingShell::default()
            });
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// semgrep CWE entries look like "CWE-798: Use of Hard-coded Credentials";
/// keep the identifier only.
fn normalize_cwe(entry: &str) -> String {
    entry
        .split(':')
        .next()
        .unwrap_or(entry)
        .trim()
        .to_string()
}

fn first_sentence(message: &str) -> String {
    let trimmed = message.trim();
    match trimmed.find(". ") {
        Some(idx) => trimmed[..=idx].to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ToolKind, parse};
    use dragnet_types::{Severity, Target};

    const REPORT: &str = r#"{
        "results": [
            {
                "check_id": "python.lang.security.audit.exec-detected",
                "path": "app/views.py",
                "start": {"line": 10, "col": 1},
                "end": {"line": 10, "col": 22},
                "extra": {
                    "severity": "ERROR",
                    "message": "Detected use of exec. This can run arbitrary code.",
                    "lines": "exec(user_input)",
                    "metadata": {
                        "cwe": ["CWE-95: Eval Injection"],
                        "owasp": ["A03:2021 - Injection"],
                        "references": ["https://owasp.org/Top10/A03_2021-Injection/"]
                    }
                }
            }
        ],
        "errors": []
    }"#;

    fn repo() -> Target {
        Target::Repo {
            path: "/tmp/app".into(),
        }
    }

    #[test]
    fn parses_results_object() {
        let out = parse(ToolKind::Semgrep, REPORT.as_bytes(), &repo());
        assert!(out.warnings.is_empty());
        assert_eq!(out.findings.len(), 1);

        let f = &out.findings[0];
        assert_eq!(f.rule_id, "python.lang.security.audit.exec-detected");
        assert_eq!(f.severity, Severity::High);
        assert_eq!(f.start_line, Some(10));
        assert_eq!(f.cwe, vec!["CWE-95".to_string()]);
        assert_eq!(f.tags, vec!["A03:2021 - Injection".to_string()]);
        assert_eq!(f.message, "Detected use of exec.");
        assert_eq!(f.context.as_deref(), Some("exec(user_input)"));
    }

    #[test]
    fn unknown_severity_maps_to_medium_with_warning() {
        let raw = br#"{"results":[{"check_id":"r","path":"p","extra":{"severity":"EXPERIMENT","message":"m"}}]}"#;
        let out = parse(ToolKind::Semgrep, raw, &repo());
        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.findings[0].severity, Severity::Medium);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn missing_results_key_is_shape_warning() {
        let out = parse(ToolKind::Semgrep, br#"{"version":"1.96.0"}"#, &repo());
        assert!(out.findings.is_empty());
        assert_eq!(out.warnings.len(), 1);
    }
}
