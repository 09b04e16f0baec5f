//! grype adapter (pinned 0.85).
//!
//! Output: a single JSON object `{matches: [...]}`.
//!
//! Severity table (grype label -> canonical):
//!
//! | grype      | canonical |
//! |------------|-----------|
//! | Critical   | CRITICAL  |
//! | High       | HIGH      |
//! | Medium     | MEDIUM    |
//! | Low        | LOW       |
//! | Negligible | INFO      |
//! | Unknown    | INFO      |

use serde_json::Value;

use dragnet_types::{Cvss, Severity, Target};

use crate::{FindingShell, ParseOutput};

fn map_severity(label: &str, out: &mut ParseOutput) -> Severity {
    match label.to_ascii_uppercase().as_str() {
        "CRITICAL" => Severity::Critical,
        "HIGH" => Severity::High,
        "MEDIUM" => Severity::Medium,
        "LOW" => Severity::Low,
        "NEGLIGIBLE" | "UNKNOWN" => Severity::Info,
        other => {
            out.warn("grype", format!("unknown severity label {other:?}"));
            Severity::Medium
        }
    }
}

pub(crate) fn parse(docs: &[Value], target: &Target, out: &mut ParseOutput) {
    for doc in docs {
        let Some(matches) = doc.get("matches").and_then(Value::as_array) else {
            out.warn("grype", "document has no matches array");
            continue;
        };

        for entry in matches {
            let Some(vuln_id) = entry.pointer("/vulnerability/id").and_then(Value::as_str)
            else {
                out.warn("grype", "match missing vulnerability id; skipped");
                continue;
            };
            let artifact_name = entry
                .pointer("/artifact/name")
                .and_then(Value::as_str)
                .unwrap_or("?");
            let artifact_version = entry
                .pointer("/artifact/version")
                .and_then(Value::as_str)
                .unwrap_or("?");
            let path = entry
                .pointer("/artifact/locations/0/path")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| target.identifier());
            let label = entry
                .pointer("/vulnerability/severity")
                .and_then(Value::as_str)
                .unwrap_or("Unknown");
            let severity = map_severity(label, out);

            let fix_versions: Vec<&str> = entry
                .pointer("/vulnerability/fix/versions")
                .and_then(Value::as_array)
                .map(|v| v.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            let cvss_score = entry
                .pointer("/vulnerability/cvss/0/metrics/baseScore")
                .and_then(Value::as_f64);

            out.findings.push(FindingShell {
                rule_id: vuln_id.to_string(),
                severity,
                path,
                message: format!(
                    "{artifact_name} {artifact_version} is vulnerable to {vuln_id}"
                ),
                description: entry
                    .pointer("/vulnerability/description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                remediation: (!fix_versions.is_empty())
                    .then(|| format!("Upgrade {artifact_name} to {}", fix_versions.join(" or "))),
                references: entry
                    .pointer("/vulnerability/urls")
                    .and_then(Value::as_array)
                    .map(|urls| {
                        urls.iter()
                            .filter_map(Value::as_str)
                            .take(5)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
                cvss: cvss_score.map(|score| Cvss {
                    score,
                    vector: None,
                }),
                raw: entry.clone(),
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
        "matches": [
            {
                "vulnerability": {
                    "id": "GHSA-j8r2-6x86-q33q",
                    "severity": "High",
                    "description": "Unintended leak of Proxy-Authorization header",
                    "fix": {"versions": ["2.31.0"], "state": "fixed"},
                    "urls": ["https://github.com/advisories/GHSA-j8r2-6x86-q33q"],
                    "cvss": [{"metrics": {"baseScore": 6.1}}]
                },
                "artifact": {
                    "name": "requests",
                    "version": "2.28.0",
                    "locations": [{"path": "requirements.txt"}]
                }
            }
        ]
    }"#;

    fn repo() -> Target {
        Target::Repo {
            path: "/tmp/app".into(),
        }
    }

    #[test]
    fn parses_matches() {
        let out = parse(ToolKind::Grype, REPORT.as_bytes(), &repo());
        assert!(out.warnings.is_empty());
        assert_eq!(out.findings.len(), 1);

        let f = &out.findings[0];
        assert_eq!(f.rule_id, "GHSA-j8r2-6x86-q33q");
        assert_eq!(f.severity, Severity::High);
        assert_eq!(f.path, "requirements.txt");
        assert!(f.remediation.as_deref().unwrap().contains("2.31.0"));
    }

    #[test]
    fn negligible_maps_to_info() {
        let raw = br#"{"matches":[{"vulnerability":{"id":"CVE-1-1","severity":"Negligible"},"artifact":{"name":"zlib","version":"1"}}]}"#;
        let out = parse(ToolKind::Grype, raw, &repo());
        assert_eq!(out.findings[0].severity, Severity::Info);
        // No file location: falls back to the target identifier.
        assert_eq!(out.findings[0].path, "/tmp/app");
    }
}
