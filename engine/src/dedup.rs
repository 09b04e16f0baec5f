//! Deduplication and cross-tool consensus.
//!
//! Within one scan, findings sharing a fingerprint are the same defect.
//! The merge keeps the worst severity, the longest message, the union of
//! raw payloads, and records every distinct (tool, version) pair in
//! `detected_by`. Merging is associative and commutative up to the final
//! canonical sort, so worker completion order does not matter.

use std::collections::HashMap;

use dragnet_types::Finding;

/// Merge findings by fingerprint. Output order is unspecified; the caller
/// applies the canonical sort at emit time.
#[must_use]
pub fn dedup_findings(findings: Vec<Finding>) -> Vec<Finding> {
    let mut merged: HashMap<String, Finding> = HashMap::with_capacity(findings.len());

    for finding in findings {
        match merged.remove(&finding.id) {
            None => {
                merged.insert(finding.id.clone(), finding);
            }
            Some(existing) => {
                let combined = merge_pair(existing, finding);
                merged.insert(combined.id.clone(), combined);
            }
        }
    }

    merged.into_values().collect()
}

/// Merge two findings with the same fingerprint. Field policy: severity is
/// the max; the message is the longest non-empty (ties broken
/// lexicographically); scalar fields come from the higher-severity source;
/// list fields union and sort. Every choice is deterministic so the merged
/// record does not depend on worker completion order.
fn merge_pair(a: Finding, b: Finding) -> Finding {
    use std::cmp::Ordering;

    let (mut base, other) = match b.severity.cmp(&a.severity) {
        Ordering::Greater => (b, a),
        Ordering::Less => (a, b),
        Ordering::Equal => {
            if b.tool < a.tool {
                (b, a)
            } else {
                (a, b)
            }
        }
    };

    let longer = match other
        .message
        .trim()
        .len()
        .cmp(&base.message.trim().len())
    {
        Ordering::Greater => true,
        Ordering::Equal => other.message < base.message,
        Ordering::Less => false,
    };
    if longer && !other.message.trim().is_empty() {
        base.message = other.message;
    }

    for tool in other.detected_by {
        if !base.detected_by.contains(&tool) {
            base.detected_by.push(tool);
        }
    }
    base.raw.extend(other.raw);
    base.raw
        .sort_by_cached_key(|v| serde_json::to_string(v).unwrap_or_default());
    for reference in other.references {
        if !base.references.contains(&reference) {
            base.references.push(reference);
        }
    }
    for tag in other.tags {
        if !base.tags.contains(&tag) {
            base.tags.push(tag);
        }
    }
    base.references.sort();
    base.tags.sort();
    if base.title.is_none() {
        base.title = other.title;
    }
    if base.description.is_none() {
        base.description = other.description;
    }
    if base.remediation.is_none() {
        base.remediation = other.remediation;
    }
    if base.cvss.is_none() {
        base.cvss = other.cvss;
    }
    base.detected_by.sort();
    base
}
