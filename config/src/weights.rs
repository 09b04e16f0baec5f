//! Priority-formula weights.
//!
//! The numeric constants behind the priority score are under active revision
//! upstream, so they are configuration, not code. The enricher receives this
//! struct; nothing else in the codebase hard-codes a weight.

use serde::{Deserialize, Serialize};

/// Weights for `priority = min(100, round(severity * severity_weight
/// + epss * 100 * epss_weight + kev_bonus + reachability_bonus))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    /// Multiplier on the severity base score (0..=10).
    pub severity_weight: f64,
    /// Multiplier on the EPSS probability scaled to 0..=100.
    pub epss_weight: f64,
    /// Flat bonus when the finding's CVE is in the KEV catalog. KEV also
    /// floors the final score at [`PriorityWeights::KEV_FLOOR`].
    pub kev_bonus: f64,
    /// Flat bonus when the finding is known-reachable (verified secret,
    /// live DAST hit).
    pub reachability_bonus: f64,
}

impl PriorityWeights {
    /// KEV presence forces priority at least this high.
    pub const KEV_FLOOR: u8 = 90;
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            severity_weight: 10.0,
            epss_weight: 0.25,
            kev_bonus: 20.0,
            reachability_bonus: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PriorityWeights;

    #[test]
    fn overridable_from_toml_fragment() {
        let weights: PriorityWeights =
            toml::from_str("severity_weight = 8.0\nkev_bonus = 30.0").unwrap();
        assert!((weights.severity_weight - 8.0).abs() < f64::EPSILON);
        assert!((weights.kev_bonus - 30.0).abs() < f64::EPSILON);
        // Unspecified fields keep their defaults.
        assert!((weights.epss_weight - 0.25).abs() < f64::EPSILON);
    }
}
