//! `SUPPRESSIONS.md`: the audit trail for filtered findings.
//!
//! Written only when at least one rule matched this scan.

use std::collections::BTreeMap;
use std::fmt::Write;

use dragnet_types::SuppressionMatch;

#[must_use]
pub fn render(suppressed: &[SuppressionMatch], unused_rules: &[String]) -> String {
    let mut by_rule: BTreeMap<&str, Vec<&SuppressionMatch>> = BTreeMap::new();
    for entry in suppressed {
        by_rule.entry(&entry.rule_id).or_default().push(entry);
    }

    let mut out = String::new();
    let _ = writeln!(out, "# Suppressed findings");
    let _ = writeln!(out);
    let _ = writeln!(out, "Total suppressed: {}", suppressed.len());
    let _ = writeln!(out);

    for (rule_id, matches) in &by_rule {
        let reason = &matches[0].reason;
        let _ = writeln!(out, "## {rule_id} ({} match{})", matches.len(), plural(matches.len()));
        let _ = writeln!(out);
        let _ = writeln!(out, "Reason: {reason}");
        let _ = writeln!(out);
        for entry in matches {
            let finding = &entry.finding;
            let location = match finding.location.start_line {
                Some(line) => format!("{}:{line}", finding.location.path),
                None => finding.location.path.clone(),
            };
            let _ = writeln!(
                out,
                "- [{}] {} at {} ({})",
                finding.severity, finding.rule_id, location, finding.tool.name
            );
        }
        let _ = writeln!(out);
    }

    if !unused_rules.is_empty() {
        let _ = writeln!(out, "## Unused rules");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "These rules matched nothing this scan and may be stale:"
        );
        let _ = writeln!(out);
        for rule in unused_rules {
            let _ = writeln!(out, "- {rule}");
        }
    }

    out
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "es" }
}
