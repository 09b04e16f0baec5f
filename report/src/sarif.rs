//! SARIF 2.1.0 output.
//!
//! One `run` per tool, `rules[]` populated from the distinct rule ids,
//! `results[]` linked by ruleId, taxonomies for CWE/OWASP/MITRE where any
//! finding carries them, and `baselineState` set when the scan is a
//! comparison run.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Value, json};

use dragnet_types::{Finding, Scan, Severity};

/// Fingerprint -> baselineState (`new`, `unchanged`, `updated`, `absent`).
pub type BaselineStates = HashMap<String, &'static str>;

fn sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low | Severity::Info => "note",
    }
}

/// Render the SARIF document as bytes.
#[must_use]
pub fn render(scan: &Scan, findings: &[Finding], baseline: Option<&BaselineStates>) -> Vec<u8> {
    // Group by tool; one SARIF run per tool keeps driver metadata honest.
    let mut by_tool: BTreeMap<String, Vec<&Finding>> = BTreeMap::new();
    for finding in findings {
        by_tool
            .entry(finding.tool.name.clone())
            .or_default()
            .push(finding);
    }

    let runs: Vec<Value> = by_tool
        .iter()
        .map(|(tool, findings)| render_run(tool, findings, baseline))
        .collect();

    let doc = json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "properties": { "scanId": scan.scan_id, "profile": scan.profile_name },
        "runs": runs,
    });
    serde_json::to_vec_pretty(&doc).unwrap_or_default()
}

fn render_run(tool: &str, findings: &[&Finding], baseline: Option<&BaselineStates>) -> Value {
    let version = findings
        .first()
        .and_then(|f| f.tool.version.clone())
        .unwrap_or_else(|| "unknown".to_string());

    // rules[], one entry per distinct ruleId, in first-seen order.
    let mut rules: Vec<Value> = Vec::new();
    let mut rule_index: BTreeMap<&str, usize> = BTreeMap::new();
    for finding in findings {
        if rule_index.contains_key(finding.rule_id.as_str()) {
            continue;
        }
        rule_index.insert(&finding.rule_id, rules.len());
        rules.push(json!({
            "id": finding.rule_id,
            "name": finding.title.clone().unwrap_or_else(|| finding.rule_id.clone()),
            "shortDescription": { "text": finding.title.clone().unwrap_or_else(|| finding.message.clone()) },
            "helpUri": finding.references.first().cloned().unwrap_or_default(),
            "properties": { "tags": finding.tags },
        }));
    }

    let results: Vec<Value> = findings
        .iter()
        .map(|finding| {
            let mut result = json!({
                "ruleId": finding.rule_id,
                "ruleIndex": rule_index[finding.rule_id.as_str()],
                "level": sarif_level(finding.severity),
                "message": { "text": finding.message },
                "fingerprints": { "dragnet/v1": finding.id },
                "locations": [{
                    "physicalLocation": {
                        "artifactLocation": { "uri": finding.location.path },
                        "region": {
                            "startLine": finding.location.start_line.unwrap_or(1),
                            "endLine": finding.location.end_line
                                .or(finding.location.start_line)
                                .unwrap_or(1),
                        }
                    }
                }],
                "properties": {
                    "severity": finding.severity.as_str(),
                    "priority": finding.priority.score,
                    "kev": finding.kev,
                }
            });
            if let Some(states) = baseline
                && let Some(state) = states.get(&finding.id)
            {
                result["baselineState"] = json!(state);
            }
            result
        })
        .collect();

    let taxonomies = render_taxonomies(findings);

    json!({
        "tool": {
            "driver": {
                "name": tool,
                "version": version,
                "informationUri": "",
                "rules": rules,
            }
        },
        "results": results,
        "taxonomies": taxonomies,
    })
}

/// CWE / OWASP / MITRE ATT&CK taxonomies, only when some finding maps into
/// them.
fn render_taxonomies(findings: &[&Finding]) -> Vec<Value> {
    let mut cwe: Vec<String> = Vec::new();
    let mut owasp: Vec<String> = Vec::new();
    let mut attack: Vec<String> = Vec::new();
    for finding in findings {
        for id in &finding.compliance.cwe {
            if !cwe.contains(id) {
                cwe.push(id.clone());
            }
        }
        for id in &finding.compliance.owasp_top10 {
            if !owasp.contains(id) {
                owasp.push(id.clone());
            }
        }
        for id in &finding.compliance.mitre_attack {
            if !attack.contains(id) {
                attack.push(id.clone());
            }
        }
    }

    let mut taxonomies = Vec::new();
    for (name, taxa) in [
        ("CWE", cwe),
        ("OWASP Top 10", owasp),
        ("MITRE ATT&CK", attack),
    ] {
        if taxa.is_empty() {
            continue;
        }
        let entries: Vec<Value> = taxa.iter().map(|id| json!({ "id": id })).collect();
        taxonomies.push(json!({ "name": name, "taxa": entries }));
    }
    taxonomies
}
