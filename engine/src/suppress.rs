//! The suppression engine.
//!
//! Rules are compiled once per scan (path globs through `globset`), then
//! evaluated per finding in definition order with first-match-wins. Expired
//! rules are inert. Rules that never matched are reported so stale entries
//! surface in the audit trail.

use globset::{Glob, GlobMatcher};

use dragnet_types::{Finding, SuppressionMatch, SuppressionRule};

use crate::ScanError;

struct CompiledRule {
    rule: SuppressionRule,
    path_matcher: Option<GlobMatcher>,
    expired: bool,
    matches: u64,
}

/// A compiled, ordered rule set.
pub struct SuppressionSet {
    rules: Vec<CompiledRule>,
}

/// Result of filtering one finding stream.
#[derive(Debug, Default)]
pub struct SuppressionOutcome {
    pub kept: Vec<Finding>,
    /// Sidecar: each suppressed finding with the rule that claimed it.
    pub suppressed: Vec<SuppressionMatch>,
    /// Ids of non-expired rules that matched nothing this scan.
    pub unused_rules: Vec<String>,
}

impl SuppressionSet {
    /// Compile rules; a malformed glob is a configuration error, not a
    /// skipped rule - silently ignoring it would unsuppress findings.
    pub fn compile(rules: &[SuppressionRule], today: &str) -> Result<Self, ScanError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let path_matcher = match &rule.path_glob {
                Some(glob) => Some(
                    Glob::new(glob)
                        .map_err(|source| ScanError::BadSuppressionGlob {
                            rule_id: rule.id.clone(),
                            source,
                        })?
                        .compile_matcher(),
                ),
                None => None,
            };
            let expired = rule.is_expired(today);
            if expired {
                tracing::debug!(rule = %rule.id, "suppression rule expired; inert");
            }
            compiled.push(CompiledRule {
                rule: rule.clone(),
                path_matcher,
                expired,
                matches: 0,
            });
        }
        Ok(Self { rules: compiled })
    }

    /// Apply the rule set to a finding stream. Idempotent: the kept stream
    /// re-filtered through the same set is unchanged.
    #[must_use]
    pub fn apply(mut self, findings: Vec<Finding>) -> SuppressionOutcome {
        let mut out = SuppressionOutcome::default();

        for finding in findings {
            let matched = self.rules.iter_mut().find(|compiled| {
                !compiled.expired
                    && compiled.rule.matches_except_path(&finding)
                    && compiled
                        .path_matcher
                        .as_ref()
                        .is_none_or(|m| m.is_match(&finding.location.path))
            });

            match matched {
                Some(compiled) => {
                    compiled.matches += 1;
                    out.suppressed.push(SuppressionMatch {
                        rule_id: compiled.rule.id.clone(),
                        reason: compiled.rule.reason.clone(),
                        finding,
                    });
                }
                None => out.kept.push(finding),
            }
        }

        out.unused_rules = self
            .rules
            .iter()
            .filter(|c| !c.expired && c.matches == 0)
            .map(|c| c.rule.id.clone())
            .collect();
        out
    }
}
