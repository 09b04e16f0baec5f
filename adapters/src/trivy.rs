//! trivy adapter (pinned 0.58).
//!
//! Output: a single JSON object `{Results: [...]}` where each result block
//! carries `Vulnerabilities`, `Misconfigurations`, and/or `Secrets` arrays
//! depending on the scan mode (fs / image / config).
//!
//! Severity table (trivy label -> canonical):
//!
//! | trivy    | canonical |
//! |----------|-----------|
//! | CRITICAL | CRITICAL  |
//! | HIGH     | HIGH      |
//! | MEDIUM   | MEDIUM    |
//! | LOW      | LOW       |
//! | UNKNOWN  | INFO      |

use serde_json::Value;

use dragnet_types::{Cvss, Severity, Target};

use crate::{FindingShell, ParseOutput};

fn map_severity(label: &str, out: &mut ParseOutput) -> Severity {
    match label.to_ascii_uppercase().as_str() {
        "CRITICAL" => Severity::Critical,
        "HIGH" => Severity::High,
        "MEDIUM" => Severity::Medium,
        "LOW" => Severity::Low,
        "UNKNOWN" => Severity::Info,
        other => {
            out.warn("trivy", format!("unknown severity label {other:?}"));
            Severity::Medium
        }
    }
}

pub(crate) fn parse(docs: &[Value], target: &Target, out: &mut ParseOutput) {
    for doc in docs {
        let Some(results) = doc.get("Results").and_then(Value::as_array) else {
            out.warn("trivy", "document has no Results array");
            continue;
        };

        for block in results {
            let block_target = block
                .get("Target")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| target.identifier());

            if let Some(vulns) = block.get("Vulnerabilities").and_then(Value::as_array) {
                for vuln in vulns {
                    parse_vulnerability(vuln, &block_target, out);
                }
            }
            if let Some(misconfigs) = block.get("Misconfigurations").and_then(Value::as_array) {
                for misconfig in misconfigs {
                    parse_misconfiguration(misconfig, &block_target, out);
                }
            }
        }
    }
}

fn parse_vulnerability(vuln: &Value, block_target: &str, out: &mut ParseOutput) {
    let Some(id) = vuln.get("VulnerabilityID").and_then(Value::as_str) else {
        out.warn("trivy", "vulnerability entry missing VulnerabilityID; skipped");
        return;
    };
    let pkg = vuln.get("PkgName").and_then(Value::as_str).unwrap_or("?");
    let installed = vuln
        .get("InstalledVersion")
        .and_then(Value::as_str)
        .unwrap_or("?");
    let fixed = vuln.get("FixedVersion").and_then(Value::as_str);
    let label = vuln.get("Severity").and_then(Value::as_str).unwrap_or("UNKNOWN");
    let severity = map_severity(label, out);

    let cvss_score = vuln
        .pointer("/CVSS/nvd/V3Score")
        .or_else(|| vuln.pointer("/CVSS/redhat/V3Score"))
        .and_then(Value::as_f64);
    let references = vuln
        .get("References")
        .and_then(Value::as_array)
        .map(|refs| {
            refs.iter()
                .filter_map(Value::as_str)
                .take(5)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let cwe = vuln
        .get("CweIDs")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    out.findings.push(FindingShell {
        rule_id: id.to_string(),
        severity,
        path: block_target.to_string(),
        message: format!("{pkg} {installed} is vulnerable to {id}"),
        title: vuln.get("Title").and_then(Value::as_str).map(str::to_string),
        description: vuln
            .get("Description")
            .and_then(Value::as_str)
            .map(str::to_string),
        remediation: fixed.map(|v| format!("Upgrade {pkg} to {v}")),
        references,
        cvss: cvss_score.map(|score| Cvss {
            score,
            vector: vuln
                .pointer("/CVSS/nvd/V3Vector")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        cwe,
        raw: vuln.clone(),
        ..FindingShell::default()
    });
}

fn parse_misconfiguration(misconfig: &Value, block_target: &str, out: &mut ParseOutput) {
    let Some(id) = misconfig.get("ID").and_then(Value::as_str) else {
        out.warn("trivy", "misconfiguration entry missing ID; skipped");
        return;
    };
    let label = misconfig
        .get("Severity")
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN");
    let severity = map_severity(label, out);
    let title = misconfig.get("Title").and_then(Value::as_str);

    out.findings.push(FindingShell {
        rule_id: id.to_string(),
        severity,
        path: block_target.to_string(),
        start_line: misconfig
            .pointer("/CauseMetadata/StartLine")
            .and_then(Value::as_u64)
            .map(|l| l as u32),
        end_line: misconfig
            .pointer("/CauseMetadata/EndLine")
            .and_then(Value::as_u64)
            .map(|l| l as u32),
        message: title
            .map(|t| format!("{id}: {t}"))
            .unwrap_or_else(|| format!("misconfiguration {id}")),
        title: title.map(str::to_string),
        description: misconfig
            .get("Description")
            .and_then(Value::as_str)
            .map(str::to_string),
        remediation: misconfig
            .get("Resolution")
            .and_then(Value::as_str)
            .map(str::to_string),
        references: misconfig
            .get("PrimaryURL")
            .and_then(Value::as_str)
            .map(|u| vec![u.to_string()])
            .unwrap_or_default(),
        raw: misconfig.clone(),
        ..FindingShell::default()
    });
}

#[cfg(test)]
mod tests {
    use super::super::{ToolKind, parse};
    use dragnet_types::{Severity, Target};

    const REPORT: &str = r#"{
        "Results": [
            {
                "Target": "requirements.txt",
                "Class": "lang-pkgs",
                "Vulnerabilities": [
                    {
                        "VulnerabilityID": "CVE-2023-32681",
                        "PkgName": "requests",
                        "InstalledVersion": "2.28.0",
                        "FixedVersion": "2.31.0",
                        "Severity": "MEDIUM",
                        "Title": "requests: leaking Proxy-Authorization headers",
                        "CweIDs": ["CWE-200"],
                        "CVSS": {"nvd": {"V3Score": 6.1, "V3Vector": "CVSS:3.1/AV:N"}},
                        "References": ["https://nvd.nist.gov/vuln/detail/CVE-2023-32681"]
                    }
                ]
            },
            {
                "Target": "Dockerfile",
                "Class": "config",
                "Misconfigurations": [
                    {
                        "ID": "DS002",
                        "Title": "Image user should not be root",
                        "Severity": "HIGH",
                        "Resolution": "Add a USER statement",
                        "CauseMetadata": {"StartLine": 1, "EndLine": 12}
                    }
                ]
            }
        ]
    }"#;

    fn repo() -> Target {
        Target::Repo {
            path: "/tmp/app".into(),
        }
    }

    #[test]
    fn parses_vulnerabilities_and_misconfigurations() {
        let out = parse(ToolKind::Trivy, REPORT.as_bytes(), &repo());
        assert!(out.warnings.is_empty());
        assert_eq!(out.findings.len(), 2);

        let vuln = &out.findings[0];
        assert_eq!(vuln.rule_id, "CVE-2023-32681");
        assert_eq!(vuln.severity, Severity::Medium);
        assert_eq!(vuln.path, "requirements.txt");
        assert_eq!(vuln.cwe, vec!["CWE-200".to_string()]);
        assert!(vuln.remediation.as_deref().unwrap().contains("2.31.0"));
        let cvss = vuln.cvss.as_ref().unwrap();
        assert!((cvss.score - 6.1).abs() < f64::EPSILON);

        let misconfig = &out.findings[1];
        assert_eq!(misconfig.rule_id, "DS002");
        assert_eq!(misconfig.severity, Severity::High);
        assert_eq!(misconfig.start_line, Some(1));
    }

    #[test]
    fn unknown_severity_maps_to_info() {
        let raw = br#"{"Results":[{"Target":"t","Vulnerabilities":[{"VulnerabilityID":"CVE-1-1","Severity":"UNKNOWN"}]}]}"#;
        let out = parse(ToolKind::Trivy, raw, &repo());
        assert_eq!(out.findings[0].severity, Severity::Info);
    }
}
