//! hadolint adapter (pinned 2.12).
//!
//! Output: a JSON array of rule violations.
//!
//! Severity table (hadolint level -> canonical):
//!
//! | hadolint | canonical |
//! |----------|-----------|
//! | error    | HIGH      |
//! | warning  | MEDIUM    |
//! | info     | LOW       |
//! | style    | INFO      |

use serde_json::Value;

use dragnet_types::{Severity, Target};

use crate::{FindingShell, ParseOutput, flatten_documents};

fn map_severity(level: &str, out: &mut ParseOutput) -> Severity {
    match level.to_ascii_lowercase().as_str() {
        "error" => Severity::High,
        "warning" => Severity::Medium,
        "info" => Severity::Low,
        "style" => Severity::Info,
        other => {
            out.warn("hadolint", format!("unknown level {other:?}"));
            Severity::Medium
        }
    }
}

pub(crate) fn parse(docs: &[Value], _target: &Target, out: &mut ParseOutput) {
    for entry in flatten_documents(docs) {
        let Some(obj) = entry.as_object() else {
            out.warn("hadolint", format!("skipping non-object entry: {entry}"));
            continue;
        };
        let Some(code) = obj.get("code").and_then(Value::as_str) else {
            out.warn("hadolint", "entry missing code; skipped");
            continue;
        };
        let Some(file) = obj.get("file").and_then(Value::as_str) else {
            out.warn("hadolint", format!("entry {code} missing file; skipped"));
            continue;
        };

        let level = obj.get("level").and_then(Value::as_str).unwrap_or("warning");
        let severity = map_severity(level, out);
        let line = obj.get("line").and_then(Value::as_u64).map(|l| l as u32);
        let message = obj
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Dockerfile rule violated");

        out.findings.push(FindingShell {
            rule_id: code.to_string(),
            severity,
            path: file.to_string(),
            start_line: line,
            end_line: line,
            message: format!("{code}: {message}"),
            references: vec![format!("https://github.com/hadolint/hadolint/wiki/{code}")],
            raw: entry.clone(),
            ..FindingShell::default()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ToolKind, parse};
    use dragnet_types::{Severity, Target};

    const REPORT: &str = r#"[
        {
            "code": "DL3008",
            "level": "warning",
            "line": 4,
            "column": 1,
            "file": "Dockerfile",
            "message": "Pin versions in apt get install"
        },
        {
            "code": "DL3002",
            "level": "error",
            "line": 9,
            "column": 1,
            "file": "Dockerfile",
            "message": "Last USER should not be root"
        }
    ]"#;

    fn iac() -> Target {
        Target::Iac {
            path: "/tmp/infra".into(),
        }
    }

    #[test]
    fn parses_violations() {
        let out = parse(ToolKind::Hadolint, REPORT.as_bytes(), &iac());
        assert!(out.warnings.is_empty());
        assert_eq!(out.findings.len(), 2);
        assert_eq!(out.findings[0].severity, Severity::Medium);
        assert_eq!(out.findings[1].severity, Severity::High);
        assert_eq!(out.findings[1].start_line, Some(9));
        assert!(out.findings[0].references[0].contains("DL3008"));
    }

    #[test]
    fn style_level_is_info() {
        let raw = br#"[{"code":"DL3059","level":"style","line":2,"file":"Dockerfile","message":"m"}]"#;
        let out = parse(ToolKind::Hadolint, raw, &iac());
        assert_eq!(out.findings[0].severity, Severity::Info);
    }
}
