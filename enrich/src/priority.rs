//! Priority scoring.
//!
//! `priority = min(100, round(severity_score + epss_multiplier +
//! kev_multiplier + reachability_multiplier))`, with KEV membership forcing
//! the score to at least the KEV floor. Every additive term is recorded in
//! `priority.components`, so the score is reproducible from the record
//! alone. Weights come from configuration (`PriorityWeights`); none are
//! hard-coded here.

use dragnet_config::PriorityWeights;
use dragnet_types::{Epss, Finding, Priority, PriorityComponents, Severity};

/// Whether a finding is known-reachable: the defect was demonstrated live,
/// not inferred. Live DAST matches and provider-verified secrets qualify.
#[must_use]
pub fn is_reachable(finding: &Finding) -> bool {
    finding.tool.name == "nuclei"
        || (finding.tool.name == "trufflehog" && finding.severity == Severity::Critical)
}

/// Compute the deterministic priority score.
///
/// Ties between findings with equal scores are broken downstream by the
/// canonical sort (path, rule id, fingerprint), never here.
#[must_use]
pub fn score_priority(
    severity: Severity,
    epss: Option<&Epss>,
    kev: bool,
    reachable: bool,
    weights: &PriorityWeights,
) -> Priority {
    let components = PriorityComponents {
        severity_score: severity.base_score() * weights.severity_weight,
        epss_multiplier: epss.map_or(0.0, |e| e.score * 100.0 * weights.epss_weight),
        kev_multiplier: if kev { weights.kev_bonus } else { 0.0 },
        reachability_multiplier: if reachable {
            weights.reachability_bonus
        } else {
            0.0
        },
    };

    let raw = components.sum().round();
    let mut score = raw.clamp(0.0, 100.0) as u8;
    if kev {
        score = score.max(PriorityWeights::KEV_FLOOR);
    }

    Priority { score, components }
}
