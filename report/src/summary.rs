//! Human-readable `SUMMARY.md`.

use std::fmt::Write;

use dragnet_types::{Finding, Scan, Severity};

use crate::envelope::iso8601;

/// How many findings the summary table shows; the full set is in the
/// envelope.
const TABLE_LIMIT: usize = 25;

#[must_use]
pub fn render(scan: &Scan, findings: &[Finding]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Dragnet scan report");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Scan: `{}`", scan.scan_id);
    let _ = writeln!(out, "- Started: {}", iso8601(scan.timestamp_ms));
    let _ = writeln!(out, "- Profile: {}", scan.profile_name);
    let _ = writeln!(out, "- Outcome: {}", scan.outcome);
    let _ = writeln!(out, "- Duration: {:.1}s", scan.duration_ms as f64 / 1000.0);
    let _ = writeln!(out, "- Targets: {}", scan.targets.len());
    if let Some(git) = &scan.git_context {
        let commit = git.commit.as_deref().unwrap_or("?");
        let short = &commit[..commit.len().min(12)];
        let branch = git.branch.as_deref().unwrap_or("detached");
        let dirty = if git.dirty { ", dirty" } else { "" };
        let _ = writeln!(out, "- Git: {short} on {branch}{dirty}");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Findings");
    let _ = writeln!(out);
    let _ = writeln!(out, "Total findings: {}", findings.len());
    let _ = writeln!(out);
    let _ = writeln!(out, "| Severity | Count |");
    let _ = writeln!(out, "|----------|-------|");
    for severity in Severity::ALL.iter().rev() {
        let _ = writeln!(out, "| {severity} | {} |", scan.summary.get(*severity));
    }
    let _ = writeln!(out);

    if !findings.is_empty() {
        let _ = writeln!(out, "| Severity | Priority | Rule | Location | Tools |");
        let _ = writeln!(out, "|----------|----------|------|----------|-------|");
        for finding in findings.iter().take(TABLE_LIMIT) {
            let location = match finding.location.start_line {
                Some(line) => format!("{}:{line}", finding.location.path),
                None => finding.location.path.clone(),
            };
            let tools: Vec<&str> = finding
                .detected_by
                .iter()
                .map(|t| t.name.as_str())
                .collect();
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                finding.severity,
                finding.priority.score,
                finding.rule_id,
                location,
                tools.join(", "),
            );
        }
        if findings.len() > TABLE_LIMIT {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "... and {} more in findings.json",
                findings.len() - TABLE_LIMIT
            );
        }
        let _ = writeln!(out);
    }

    if !scan.attempts.is_empty() {
        let _ = writeln!(out, "## Tool runs");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Tool | Attempts |");
        let _ = writeln!(out, "|------|----------|");
        for (tool, attempts) in &scan.attempts {
            let _ = writeln!(out, "| {tool} | {attempts} |");
        }
        let _ = writeln!(out);
    }

    if !scan.warnings.is_empty() {
        let _ = writeln!(out, "## Warnings");
        let _ = writeln!(out);
        for warning in &scan.warnings {
            let _ = writeln!(out, "- {warning}");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::render;
    use dragnet_types::{Scan, ScanOutcome, SeverityCounts};

    #[test]
    fn empty_scan_reports_zero() {
        let scan = Scan {
            scan_id: "s".to_string(),
            timestamp_ms: 0,
            profile_name: "fast".to_string(),
            tools_requested: Vec::new(),
            targets: Vec::new(),
            git_context: None,
            summary: SeverityCounts::default(),
            duration_ms: 500,
            outcome: ScanOutcome::Completed,
            attempts: std::collections::BTreeMap::new(),
            warnings: vec!["one warning".to_string()],
        };
        let md = render(&scan, &[]);
        assert!(md.contains("Total findings: 0"));
        assert!(md.contains("Outcome: completed"));
        assert!(md.contains("one warning"));
    }
}
