//! Trend analysis over a branch's scan history.
//!
//! Statistical output (a Mann-Kendall monotone-trend test) requires at
//! least [`MIN_STATISTICAL_SAMPLES`] scans; smaller windows produce
//! descriptive output only. The security score condenses the latest scan
//! into a 0-100 number with a letter grade, and regression detection
//! compares the most recent scan against a rolling baseline.

use dragnet_types::SeverityCounts;

/// Minimum scans before the Mann-Kendall result is reported.
pub const MIN_STATISTICAL_SAMPLES: usize = 4;
/// Two-sided significance threshold; above it the direction is "stable".
const P_VALUE_THRESHOLD: f64 = 0.05;
/// Rolling-baseline window for regression detection.
const BASELINE_WINDOW: usize = 5;

/// Direction of the finding-count trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Worsening,
    Stable,
}

/// Security posture score for the latest scan.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SecurityScore {
    pub score: f64,
    pub grade: char,
}

/// Net-new HIGH/CRITICAL findings versus the rolling baseline.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegressionReport {
    pub latest_high_critical: u64,
    pub baseline_high_critical: f64,
    pub regressions: i64,
    pub regressed: bool,
}

/// Full trend report for one branch.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TrendReport {
    pub sample_count: usize,
    /// (timestamp_ms, counts) per scan, oldest first.
    pub series: Vec<(i64, SeverityCounts)>,
    /// Trend of the severity-weighted total. `None` below the sample floor.
    pub direction: Option<TrendDirection>,
    pub p_value: Option<f64>,
    pub score: SecurityScore,
    pub regressions: Option<RegressionReport>,
}

/// Analyze a branch's scan series, oldest first.
///
/// `kloc` is the code size in thousands of lines when known; it normalizes
/// the security score so large codebases are not penalized linearly.
#[must_use]
pub fn analyze_trend(series: &[(i64, SeverityCounts)], kloc: Option<f64>) -> TrendReport {
    let weighted: Vec<f64> = series.iter().map(|(_, c)| weighted_total(c)).collect();

    let (direction, p_value) = if series.len() >= MIN_STATISTICAL_SAMPLES {
        let (s, p) = mann_kendall(&weighted);
        let direction = if p >= P_VALUE_THRESHOLD {
            TrendDirection::Stable
        } else if s > 0 {
            TrendDirection::Worsening
        } else {
            TrendDirection::Improving
        };
        (Some(direction), Some(p))
    } else {
        (None, None)
    };

    let latest = series.last().map(|(_, c)| *c).unwrap_or_default();
    let improving = direction == Some(TrendDirection::Improving);
    let score = security_score(&latest, kloc, improving);

    let regressions = (series.len() >= 2).then(|| regression_report(series));

    TrendReport {
        sample_count: series.len(),
        series: series.to_vec(),
        direction,
        p_value,
        score,
        regressions,
    }
}

/// Severity-weighted total used as the trend variable.
fn weighted_total(counts: &SeverityCounts) -> f64 {
    10.0 * counts.critical as f64
        + 5.0 * counts.high as f64
        + 2.0 * counts.medium as f64
        + counts.low as f64
}

/// `100 - critical*10 - high*5 - medium*2 (+5 improvement bonus)`, with the
/// deduction divided by `kloc` when code size is known. Clamped to [0, 100].
fn security_score(latest: &SeverityCounts, kloc: Option<f64>, improving: bool) -> SecurityScore {
    let mut deduction =
        10.0 * latest.critical as f64 + 5.0 * latest.high as f64 + 2.0 * latest.medium as f64;
    if let Some(kloc) = kloc
        && kloc > 1.0
    {
        deduction /= kloc;
    }
    let bonus = if improving { 5.0 } else { 0.0 };
    let score = (100.0 - deduction + bonus).clamp(0.0, 100.0);
    SecurityScore {
        score,
        grade: letter_grade(score),
    }
}

/// Fixed grade bands.
#[must_use]
pub fn letter_grade(score: f64) -> char {
    if score >= 90.0 {
        'A'
    } else if score >= 80.0 {
        'B'
    } else if score >= 70.0 {
        'C'
    } else if score >= 60.0 {
        'D'
    } else {
        'F'
    }
}

fn regression_report(series: &[(i64, SeverityCounts)]) -> RegressionReport {
    let latest = series.last().map(|(_, c)| *c).unwrap_or_default();
    let latest_hc = latest.high + latest.critical;

    let window_start = series.len().saturating_sub(1 + BASELINE_WINDOW);
    let baseline = &series[window_start..series.len() - 1];
    let baseline_mean = if baseline.is_empty() {
        0.0
    } else {
        baseline
            .iter()
            .map(|(_, c)| (c.high + c.critical) as f64)
            .sum::<f64>()
            / baseline.len() as f64
    };

    let regressions = latest_hc as i64 - baseline_mean.round() as i64;
    RegressionReport {
        latest_high_critical: latest_hc,
        baseline_high_critical: baseline_mean,
        regressions,
        regressed: regressions > 0,
    }
}

/// Mann-Kendall S statistic and two-sided p-value via the normal
/// approximation with tie correction.
fn mann_kendall(values: &[f64]) -> (i64, f64) {
    let n = values.len();
    let mut s: i64 = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            s += match values[j].partial_cmp(&values[i]) {
                Some(std::cmp::Ordering::Greater) => 1,
                Some(std::cmp::Ordering::Less) => -1,
                _ => 0,
            };
        }
    }

    // Tie correction over groups of equal values.
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut tie_term = 0.0;
    let mut run = 1usize;
    for i in 1..=sorted.len() {
        if i < sorted.len() && (sorted[i] - sorted[i - 1]).abs() < f64::EPSILON {
            run += 1;
        } else {
            if run > 1 {
                let t = run as f64;
                tie_term += t * (t - 1.0) * (2.0 * t + 5.0);
            }
            run = 1;
        }
    }

    let nf = n as f64;
    let variance = (nf * (nf - 1.0) * (2.0 * nf + 5.0) - tie_term) / 18.0;
    if variance <= 0.0 {
        return (s, 1.0);
    }

    let z = if s > 0 {
        (s as f64 - 1.0) / variance.sqrt()
    } else if s < 0 {
        (s as f64 + 1.0) / variance.sqrt()
    } else {
        0.0
    };
    let p = 2.0 * (1.0 - standard_normal_cdf(z.abs()));
    (s, p.clamp(0.0, 1.0))
}

/// Abramowitz & Stegun 7.1.26 erf approximation; plenty for a p-value
/// compared against 0.05.
fn standard_normal_cdf(z: f64) -> f64 {
    let x = z / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    let erf = 1.0 - poly * (-x * x).exp();
    0.5 * (1.0 + erf)
}

#[cfg(test)]
mod tests {
    use super::{MIN_STATISTICAL_SAMPLES, TrendDirection, analyze_trend, letter_grade};
    use dragnet_types::SeverityCounts;

    fn counts(critical: u64, high: u64, medium: u64) -> SeverityCounts {
        SeverityCounts {
            info: 0,
            low: 0,
            medium,
            high,
            critical,
        }
    }

    fn series(values: &[(u64, u64, u64)]) -> Vec<(i64, SeverityCounts)> {
        values
            .iter()
            .enumerate()
            .map(|(i, (c, h, m))| (i as i64 * 1000, counts(*c, *h, *m)))
            .collect()
    }

    #[test]
    fn small_windows_are_descriptive_only() {
        let report = analyze_trend(&series(&[(0, 1, 2), (0, 2, 2), (1, 2, 3)]), None);
        assert!(report.sample_count < MIN_STATISTICAL_SAMPLES);
        assert!(report.direction.is_none());
        assert!(report.p_value.is_none());
        assert_eq!(report.series.len(), 3);
    }

    #[test]
    fn monotonic_growth_is_worsening() {
        let report = analyze_trend(
            &series(&[(0, 0, 1), (0, 1, 2), (1, 2, 3), (2, 3, 4), (3, 4, 5), (4, 5, 6)]),
            None,
        );
        assert_eq!(report.direction, Some(TrendDirection::Worsening));
        assert!(report.p_value.unwrap() < 0.05);
    }

    #[test]
    fn monotonic_decline_is_improving() {
        let report = analyze_trend(
            &series(&[(4, 5, 6), (3, 4, 5), (2, 3, 4), (1, 2, 3), (0, 1, 2), (0, 0, 1)]),
            None,
        );
        assert_eq!(report.direction, Some(TrendDirection::Improving));
    }

    #[test]
    fn flat_series_is_stable() {
        let report = analyze_trend(
            &series(&[(1, 1, 1), (1, 1, 1), (1, 1, 1), (1, 1, 1), (1, 1, 1)]),
            None,
        );
        assert_eq!(report.direction, Some(TrendDirection::Stable));
    }

    #[test]
    fn score_and_grades() {
        let clean = analyze_trend(&series(&[(0, 0, 0)]), None);
        assert!((clean.score.score - 100.0).abs() < f64::EPSILON);
        assert_eq!(clean.score.grade, 'A');

        let bad = analyze_trend(&series(&[(5, 5, 5)]), None);
        assert_eq!(bad.score.grade, 'F');

        assert_eq!(letter_grade(85.0), 'B');
        assert_eq!(letter_grade(70.0), 'C');
        assert_eq!(letter_grade(60.0), 'D');
    }

    #[test]
    fn kloc_normalizes_the_deduction() {
        let raw = analyze_trend(&series(&[(2, 4, 0)]), None);
        let normalized = analyze_trend(&series(&[(2, 4, 0)]), Some(10.0));
        assert!(normalized.score.score > raw.score.score);
    }

    #[test]
    fn regression_detection_flags_new_high_critical() {
        let report = analyze_trend(
            &series(&[(0, 1, 0), (0, 1, 0), (0, 1, 0), (0, 1, 0), (2, 3, 0)]),
            None,
        );
        let regressions = report.regressions.unwrap();
        assert_eq!(regressions.latest_high_critical, 5);
        assert!(regressions.regressed);
        assert_eq!(regressions.regressions, 4);
    }

    #[test]
    fn steady_state_is_not_a_regression() {
        let report = analyze_trend(
            &series(&[(0, 2, 0), (0, 2, 0), (0, 2, 0), (0, 2, 0)]),
            None,
        );
        assert!(!report.regressions.unwrap().regressed);
    }
}
