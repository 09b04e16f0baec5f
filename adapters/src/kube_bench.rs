//! kube-bench adapter (pinned 0.9).
//!
//! Output: a single JSON object `{Controls: [...]}` (or `{Totals, Controls}`
//! in newer releases) with nested `tests[].results[]`.
//!
//! Severity table: kube-bench reports CIS benchmark pass/fail, not graded
//! severities. A FAIL on a scored check is HIGH, a FAIL on an unscored
//! check is MEDIUM, and a WARN is LOW. PASS and INFO results are not
//! findings.

use serde_json::Value;

use dragnet_types::{Severity, Target};

use crate::{FindingShell, ParseOutput};

pub(crate) fn parse(docs: &[Value], target: &Target, out: &mut ParseOutput) {
    for doc in docs {
        let controls = match doc.get("Controls").and_then(Value::as_array) {
            Some(controls) => controls.to_vec(),
            // Single-control documents (one per node role) have `tests` at
            // the top level.
            None if doc.get("tests").is_some() => vec![doc.clone()],
            None => {
                out.warn("kube-bench", "document has no Controls array");
                continue;
            }
        };

        for control in &controls {
            let section = control.get("text").and_then(Value::as_str).unwrap_or("");
            let Some(tests) = control.get("tests").and_then(Value::as_array) else {
                continue;
            };
            for test in tests {
                let Some(results) = test.get("results").and_then(Value::as_array) else {
                    continue;
                };
                for result in results {
                    parse_result(result, section, target, out);
                }
            }
        }
    }
}

fn parse_result(result: &Value, section: &str, target: &Target, out: &mut ParseOutput) {
    let status = result
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_ascii_uppercase();
    let severity = match status.as_str() {
        "FAIL" => {
            if result.get("scored").and_then(Value::as_bool).unwrap_or(false) {
                Severity::High
            } else {
                Severity::Medium
            }
        }
        "WARN" => Severity::Low,
        _ => return,
    };

    let Some(number) = result.get("test_number").and_then(Value::as_str) else {
        out.warn("kube-bench", "result missing test_number; skipped");
        return;
    };
    let desc = result
        .get("test_desc")
        .and_then(Value::as_str)
        .unwrap_or("CIS benchmark check failed");

    out.findings.push(FindingShell {
        rule_id: format!("CIS-{number}"),
        severity,
        path: target.identifier(),
        message: format!("{number} {desc}"),
        title: Some(desc.to_string()),
        remediation: result
            .get("remediation")
            .and_then(Value::as_str)
            .map(str::to_string),
        tags: (!section.is_empty())
            .then(|| vec![section.to_string()])
            .unwrap_or_default(),
        raw: result.clone(),
        ..FindingShell::default()
    });
}

#[cfg(test)]
mod tests {
    use super::super::{ToolKind, parse};
    use dragnet_types::{Severity, Target};

    const REPORT: &str = r#"{
        "Controls": [
            {
                "id": "1",
                "text": "Control Plane Security Configuration",
                "tests": [
                    {
                        "section": "1.2",
                        "results": [
                            {
                                "test_number": "1.2.16",
                                "test_desc": "Ensure that the --audit-log-path argument is set",
                                "status": "FAIL",
                                "scored": true,
                                "remediation": "Edit the API server pod specification and set --audit-log-path"
                            },
                            {
                                "test_number": "1.2.1",
                                "test_desc": "Ensure that anonymous-auth is not enabled",
                                "status": "PASS",
                                "scored": true
                            },
                            {
                                "test_number": "1.2.33",
                                "test_desc": "Ensure that encryption providers are configured",
                                "status": "WARN",
                                "scored": false
                            }
                        ]
                    }
                ]
            }
        ]
    }"#;

    fn cluster() -> Target {
        Target::Kubernetes {
            context: "prod".to_string(),
            namespace: None,
        }
    }

    #[test]
    fn fails_and_warns_become_findings() {
        let out = parse(ToolKind::KubeBench, REPORT.as_bytes(), &cluster());
        assert!(out.warnings.is_empty());
        assert_eq!(out.findings.len(), 2, "PASS results are not findings");

        let fail = &out.findings[0];
        assert_eq!(fail.rule_id, "CIS-1.2.16");
        assert_eq!(fail.severity, Severity::High);
        assert_eq!(fail.path, "prod");
        assert!(fail.remediation.is_some());

        let warn = &out.findings[1];
        assert_eq!(warn.severity, Severity::Low);
    }
}
