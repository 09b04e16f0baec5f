//! bandit adapter (pinned 1.7).
//!
//! Output: a single JSON object `{results: [...], metrics: {...}}`.
//!
//! Severity table (bandit label -> canonical):
//!
//! | bandit    | canonical |
//! |-----------|-----------|
//! | HIGH      | HIGH      |
//! | MEDIUM    | MEDIUM    |
//! | LOW       | LOW       |
//! | UNDEFINED | INFO      |

use serde_json::Value;

use dragnet_types::{Severity, Target};

use crate::{FindingShell, ParseOutput};

fn map_severity(label: &str, out: &mut ParseOutput) -> Severity {
    match label.to_ascii_uppercase().as_str() {
        "HIGH" => Severity::High,
        "MEDIUM" => Severity::Medium,
        "LOW" => Severity::Low,
        "UNDEFINED" => Severity::Info,
        other => {
            out.warn("bandit", format!("unknown severity label {other:?}"));
            Severity::Medium
        }
    }
}

pub(crate) fn parse(docs: &[Value], _target: &Target, out: &mut ParseOutput) {
    for doc in docs {
        let Some(results) = doc.get("results").and_then(Value::as_array) else {
            out.warn("bandit", "document has no results array");
            continue;
        };

        for result in results {
            let Some(test_id) = result.get("test_id").and_then(Value::as_str) else {
                out.warn("bandit", "result missing test_id; skipped");
                continue;
            };
            let Some(filename) = result.get("filename").and_then(Value::as_str) else {
                out.warn("bandit", format!("result {test_id} missing filename; skipped"));
                continue;
            };

            let label = result
                .get("issue_severity")
                .and_then(Value::as_str)
                .unwrap_or("UNDEFINED");
            let severity = map_severity(label, out);
            let message = result
                .get("issue_text")
                .and_then(Value::as_str)
                .unwrap_or("bandit check failed");
            let line = result
                .get("line_number")
                .and_then(Value::as_u64)
                .map(|l| l as u32);
            let end_line = result
                .get("line_range")
                .and_then(Value::as_array)
                .and_then(|r| r.last())
                .and_then(Value::as_u64)
                .map(|l| l as u32);
            let cwe = result
                .pointer("/issue_cwe/id")
                .and_then(Value::as_u64)
                .map(|id| vec![format!("CWE-{id}")])
                .unwrap_or_default();
            let references = result
                .get("more_info")
                .and_then(Value::as_str)
                .map(|u| vec![u.to_string()])
                .unwrap_or_default();

            out.findings.push(FindingShell {
                rule_id: test_id.to_string(),
                severity,
                path: filename.to_string(),
                start_line: line,
                end_line: end_line.or(line),
                message: message.to_string(),
                title: result
                    .get("test_name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                references,
                context: result
                    .get("code")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                cwe,
                raw: result.clone(),
                ..FindingShell::default()
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ToolKind, parse};
    use dragnet_types::{Severity, Target};

    const REPORT: &str = r#"{
        "results": [
            {
                "test_id": "B602",
                "test_name": "subprocess_popen_with_shell_equals_true",
                "issue_severity": "HIGH",
                "issue_confidence": "HIGH",
                "issue_text": "subprocess call with shell=True identified, security issue.",
                "filename": "app/runner.py",
                "line_number": 42,
                "line_range": [42, 43],
                "issue_cwe": {"id": 78, "link": "https://cwe.mitre.org/data/definitions/78.html"},
                "more_info": "https://bandit.readthedocs.io/en/1.7.0/plugins/b602.html",
                "code": "subprocess.Popen(cmd, shell=True)"
            }
        ],
        "metrics": {}
    }"#;

    fn repo() -> Target {
        Target::Repo {
            path: "/tmp/app".into(),
        }
    }

    #[test]
    fn parses_results_with_cwe() {
        let out = parse(ToolKind::Bandit, REPORT.as_bytes(), &repo());
        assert!(out.warnings.is_empty());
        assert_eq!(out.findings.len(), 1);

        let f = &out.findings[0];
        assert_eq!(f.rule_id, "B602");
        assert_eq!(f.severity, Severity::High);
        assert_eq!(f.start_line, Some(42));
        assert_eq!(f.end_line, Some(43));
        assert_eq!(f.cwe, vec!["CWE-78".to_string()]);
    }

    #[test]
    fn undefined_severity_is_info() {
        let raw = br#"{"results":[{"test_id":"B000","filename":"x.py","issue_severity":"UNDEFINED","issue_text":"m"}]}"#;
        let out = parse(ToolKind::Bandit, raw, &repo());
        assert_eq!(out.findings[0].severity, Severity::Info);
        assert!(out.warnings.is_empty());
    }
}
