//! checkov adapter (pinned 3.2).
//!
//! Output: a single JSON object `{results: {failed_checks: [...]}}`, or an
//! array of such objects (one per framework) on multi-framework scans.
//!
//! Severity table: checkov only attaches severities on platform-licensed
//! runs; a present label maps through the canonical parse, an absent one
//! defaults to MEDIUM.

use std::str::FromStr;

use serde_json::Value;

use dragnet_types::{Severity, Target};

use crate::{FindingShell, ParseOutput, flatten_documents};

pub(crate) fn parse(docs: &[Value], _target: &Target, out: &mut ParseOutput) {
    for doc in flatten_documents(docs) {
        let Some(failed) = doc
            .pointer("/results/failed_checks")
            .and_then(Value::as_array)
        else {
            out.warn("checkov", "document has no results.failed_checks array");
            continue;
        };

        for check in failed {
            let Some(check_id) = check.get("check_id").and_then(Value::as_str) else {
                out.warn("checkov", "failed check missing check_id; skipped");
                continue;
            };
            let Some(file_path) = check.get("file_path").and_then(Value::as_str) else {
                out.warn("checkov", format!("check {check_id} missing file_path; skipped"));
                continue;
            };

            let severity = check
                .get("severity")
                .and_then(Value::as_str)
                .and_then(|label| Severity::from_str(label).ok())
                .unwrap_or(Severity::Medium);
            let name = check
                .get("check_name")
                .and_then(Value::as_str)
                .unwrap_or("policy check failed");
            let resource = check.get("resource").and_then(Value::as_str);
            let range = check.get("file_line_range").and_then(Value::as_array);
            let start_line = range
                .and_then(|r| r.first())
                .and_then(Value::as_u64)
                .map(|l| l as u32);
            let end_line = range
                .and_then(|r| r.get(1))
                .and_then(Value::as_u64)
                .map(|l| l as u32);

            out.findings.push(FindingShell {
                rule_id: check_id.to_string(),
                severity,
                // checkov paths lead with a slash relative to the scan root.
                path: file_path.trim_start_matches('/').to_string(),
                start_line,
                end_line,
                message: match resource {
                    Some(resource) => format!("{name} ({resource})"),
                    None => name.to_string(),
                },
                title: Some(name.to_string()),
                references: check
                    .get("guideline")
                    .and_then(Value::as_str)
                    .map(|u| vec![u.to_string()])
                    .unwrap_or_default(),
                tags: resource.map(|r| vec![r.to_string()]).unwrap_or_default(),
                raw: check.clone(),
                ..FindingShell::default()
            });
        }
    }
}
