//! nuclei adapter (pinned 3.3).
//!
//! Output: newline-delimited JSON, one object per template match.
//!
//! Severity table (nuclei label -> canonical):
//!
//! | nuclei   | canonical |
//! |----------|-----------|
//! | critical | CRITICAL  |
//! | high     | HIGH      |
//! | medium   | MEDIUM    |
//! | low      | LOW       |
//! | info     | INFO      |
//! | unknown  | INFO      |

use serde_json::Value;

use dragnet_types::{Cvss, Severity, Target};

use crate::{FindingShell, ParseOutput, flatten_documents};

fn map_severity(label: &str, out: &mut ParseOutput) -> Severity {
    match label.to_ascii_lowercase().as_str() {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        "low" => Severity::Low,
        "info" | "unknown" => Severity::Info,
        other => {
            out.warn("nuclei", format!("unknown severity label {other:?}"));
            Severity::Medium
        }
    }
}

pub(crate) fn parse(docs: &[Value], target: &Target, out: &mut ParseOutput) {
    for entry in flatten_documents(docs) {
        let Some(template_id) = entry.get("template-id").and_then(Value::as_str) else {
            out.warn("nuclei", "entry missing template-id; skipped");
            continue;
        };

        let info = entry.get("info");
        let label = info
            .and_then(|i| i.get("severity"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let severity = map_severity(label, out);
        let name = info
            .and_then(|i| i.get("name"))
            .and_then(Value::as_str)
            .unwrap_or(template_id);
        let matched_at = entry
            .get("matched-at")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| target.identifier());

        let cwe = info
            .and_then(|i| i.pointer("/classification/cwe-id"))
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_uppercase)
                    .collect()
            })
            .unwrap_or_default();
        let cvss_score = info
            .and_then(|i| i.pointer("/classification/cvss-score"))
            .and_then(Value::as_f64);

        out.findings.push(FindingShell {
            rule_id: template_id.to_string(),
            severity,
            path: matched_at.clone(),
            message: format!("{name} at {matched_at}"),
            title: Some(name.to_string()),
            description: info
                .and_then(|i| i.get("description"))
                .and_then(Value::as_str)
                .map(str::to_string),
            remediation: info
                .and_then(|i| i.get("remediation"))
                .and_then(Value::as_str)
                .map(str::to_string),
            references: info
                .and_then(|i| i.get("reference"))
                .and_then(Value::as_array)
                .map(|refs| {
                    refs.iter()
                        .filter_map(Value::as_str)
                        .take(5)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            tags: info
                .and_then(|i| i.get("tags"))
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            cvss: cvss_score.map(|score| Cvss {
                score,
                vector: info
                    .and_then(|i| i.pointer("/classification/cvss-metrics"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            cwe,
            raw: entry.clone(),
            ..FindingShell::default()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ToolKind, parse};
    use dragnet_types::{Severity, Target};

    fn url() -> Target {
        Target::Url {
            url: "https://staging.example.com".to_string(),
        }
    }

    #[test]
    fn parses_jsonl_matches() {
        let raw = concat!(
            r#"{"template-id":"tech-detect","info":{"name":"Tech Detect","severity":"info"},"matched-at":"https://staging.example.com"}"#,
            "\n",
            r#"{"template-id":"CVE-2021-44228","info":{"name":"Log4j RCE","severity":"critical","classification":{"cwe-id":["cwe-502"],"cvss-score":10.0}},"matched-at":"https://staging.example.com/api"}"#,
            "\n",
        );
        let out = parse(ToolKind::Nuclei, raw.as_bytes(), &url());
        assert!(out.warnings.is_empty());
        assert_eq!(out.findings.len(), 2);

        let log4j = &out.findings[1];
        assert_eq!(log4j.rule_id, "CVE-2021-44228");
        assert_eq!(log4j.severity, Severity::Critical);
        assert_eq!(log4j.cwe, vec!["CWE-502".to_string()]);
        assert_eq!(log4j.path, "https://staging.example.com/api");
    }

    #[test]
    fn missing_matched_at_falls_back_to_target() {
        let raw = br#"{"template-id":"t","info":{"severity":"low"}}"#;
        let out = parse(ToolKind::Nuclei, raw, &url());
        assert_eq!(out.findings[0].path, "https://staging.example.com");
    }
}
