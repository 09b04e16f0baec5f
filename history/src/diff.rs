//! The diff engine: classify two scans' findings by fingerprint.
//!
//! O(|A| + |B|): one hash index over the baseline, one pass over the
//! current set, one sweep for resolved leftovers. Modification detection
//! compares the tracked attributes {severity, message, priority,
//! compliance, cwe} and derives a coarse risk delta.

use std::collections::HashMap;

use dragnet_types::{
    DiffOptions, FieldChange, Finding, ModifiedFinding, RiskDelta, ScanDiff, TrendThresholds,
};

/// Classify `current` against `baseline`.
#[must_use]
pub fn diff_findings(
    baseline: Vec<Finding>,
    current: Vec<Finding>,
    options: &DiffOptions,
) -> ScanDiff {
    let mut diff = ScanDiff::default();

    let mut base_index: HashMap<String, Finding> = baseline
        .into_iter()
        .filter(|f| passes_filters(f, options))
        .map(|f| (f.id.clone(), f))
        .collect();

    for finding in current.into_iter().filter(|f| passes_filters(f, options)) {
        match base_index.remove(&finding.id) {
            None => {
                diff.new_counts.record(finding.severity);
                diff.new.push(finding);
            }
            Some(old) => {
                let changes = if options.detect_modifications {
                    tracked_changes(&old, &finding)
                } else {
                    Vec::new()
                };
                if changes.is_empty() {
                    diff.unchanged.push(finding);
                } else {
                    let risk_delta = risk_delta(&old, &finding);
                    diff.modified.push(ModifiedFinding {
                        finding,
                        changes,
                        risk_delta,
                    });
                }
            }
        }
    }

    // Whatever is left in the index existed only in the baseline.
    let mut resolved: Vec<Finding> = base_index.into_values().collect();
    resolved.sort_by(Finding::canonical_cmp);
    for finding in &resolved {
        diff.resolved_counts.record(finding.severity);
    }
    diff.resolved = resolved;

    diff.new.sort_by(Finding::canonical_cmp);
    diff.unchanged.sort_by(Finding::canonical_cmp);
    diff.modified.sort_by(|a, b| a.finding.canonical_cmp(&b.finding));

    diff.trend = Some(diff.trend_label(TrendThresholds::default()));
    diff
}

fn passes_filters(finding: &Finding, options: &DiffOptions) -> bool {
    if let Some(min) = options.min_severity
        && finding.severity < min
    {
        return false;
    }
    if !options.tools.is_empty() && !options.tools.contains(&finding.tool.name) {
        return false;
    }
    true
}

/// The attribute set modification detection tracks, with old/new values.
fn tracked_changes(old: &Finding, new: &Finding) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let mut push = |field: &str, old_value: String, new_value: String| {
        if old_value != new_value {
            changes.push(FieldChange {
                field: field.to_string(),
                old: old_value,
                new: new_value,
            });
        }
    };

    push(
        "severity",
        old.severity.to_string(),
        new.severity.to_string(),
    );
    push("message", old.message.clone(), new.message.clone());
    push(
        "priority",
        old.priority.score.to_string(),
        new.priority.score.to_string(),
    );
    push(
        "compliance",
        serde_json::to_string(&old.compliance).unwrap_or_default(),
        serde_json::to_string(&new.compliance).unwrap_or_default(),
    );
    push("cwe", old.compliance.cwe.join(","), new.compliance.cwe.join(","));
    changes
}

/// Coarse movement: severity or priority up means worsened, down means
/// improved, anything else (message wording, CWE reclassification) is
/// neutral.
fn risk_delta(old: &Finding, new: &Finding) -> RiskDelta {
    if new.severity > old.severity || new.priority.score > old.priority.score {
        RiskDelta::Worsened
    } else if new.severity < old.severity || new.priority.score < old.priority.score {
        RiskDelta::Improved
    } else {
        RiskDelta::Unchanged
    }
}
