//! gitleaks adapter (pinned 8.21).
//!
//! Output: a JSON array of leak objects, one per detected secret.
//!
//! Severity table: gitleaks does not grade its findings, so the mapping is
//! rule-shaped - any hard credential match is HIGH; rules with a `generic`
//! prefix (entropy heuristics, catch-all API keys) are MEDIUM.

use serde_json::Value;

use dragnet_types::{Severity, Target};

use crate::secret_class::class_for_gitleaks_rule;
use crate::{FindingShell, ParseOutput, flatten_documents};

fn severity_for_rule(rule_id: &str) -> Severity {
    if rule_id.starts_with("generic") {
        Severity::Medium
    } else {
        Severity::High
    }
}

pub(crate) fn parse(docs: &[Value], _target: &Target, out: &mut ParseOutput) {
    for leak in flatten_documents(docs) {
        let Some(obj) = leak.as_object() else {
            out.warn("gitleaks", format!("skipping non-object entry: {leak}"));
            continue;
        };

        let Some(rule_id) = obj.get("RuleID").and_then(Value::as_str) else {
            out.warn("gitleaks", "leak entry missing RuleID; skipped");
            continue;
        };
        let Some(file) = obj.get("File").and_then(Value::as_str) else {
            out.warn("gitleaks", format!("leak {rule_id} missing File; skipped"));
            continue;
        };

        let description = obj.get("Description").and_then(Value::as_str);
        let start_line = obj.get("StartLine").and_then(Value::as_u64).map(|l| l as u32);
        let end_line = obj.get("EndLine").and_then(Value::as_u64).map(|l| l as u32);
        let tags = obj
            .get("Tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        out.findings.push(FindingShell {
            rule_id: rule_id.to_string(),
            severity: severity_for_rule(rule_id),
            path: file.to_string(),
            start_line,
            end_line,
            message: description
                .map(|d| format!("{d} detected in {file}"))
                .unwrap_or_else(|| format!("secret matching rule {rule_id} detected in {file}")),
            title: description.map(str::to_string),
            remediation: Some(
                "Rotate the credential and purge it from history; keep secrets in a vault."
                    .to_string(),
            ),
            tags,
            // Hardcoded credentials.
            cwe: vec!["CWE-798".to_string()],
            consensus_key: class_for_gitleaks_rule(rule_id),
            raw: leak.clone(),
            ..FindingShell::default()
        });
    }
}
