//! The enrichment pipeline.
//!
//! Two concerns, run in order: EPSS/KEV lookup for CVE-bearing findings
//! (local cache first, best-effort network refresh, never blocking a scan),
//! then compliance-framework mapping and the priority score. Enrichment
//! failures degrade, they never fail: a finding without EPSS data simply
//! scores on severity alone.

mod compliance;
mod cve;
mod epss;
mod kev;
mod priority;

use std::path::Path;

use dragnet_config::PriorityWeights;
use dragnet_types::Finding;

pub use compliance::apply_compliance;
pub use cve::extract_cves;
pub use epss::EpssStore;
pub use kev::KevStore;
pub use priority::{is_reachable, score_priority};

/// Process-wide enrichment resources, initialized at scan start and passed
/// through the pipeline as a handle.
pub struct Enricher {
    epss: EpssStore,
    kev: KevStore,
    weights: PriorityWeights,
    offline: bool,
}

impl Enricher {
    /// Load cached feeds from `cache_dir`; entries past their TTLs are
    /// treated as missing and refreshed over the network during `enrich`.
    pub fn new(
        cache_dir: &Path,
        epss_ttl_days: u64,
        kev_refresh_days: u64,
        weights: PriorityWeights,
    ) -> Self {
        Self {
            epss: EpssStore::load(cache_dir, epss_ttl_days),
            kev: KevStore::load(cache_dir, kev_refresh_days),
            weights,
            offline: false,
        }
    }

    /// Cache-only mode: no network refresh. Used by tests and air-gapped
    /// runs.
    #[must_use]
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Enrich all findings in place: EPSS/KEV, compliance, priority.
    pub async fn enrich(&mut self, findings: &mut [Finding]) {
        // Batch the network round-trips: one EPSS query for every unseen
        // CVE across the scan, one KEV refresh if the catalog is stale.
        if !self.offline {
            let missing: Vec<String> = findings
                .iter()
                .flat_map(extract_cves)
                .filter(|cve| !self.epss.contains(cve))
                .collect();
            if let Err(e) = self.epss.refresh(&missing).await {
                tracing::warn!("EPSS refresh failed, proceeding without: {e}");
            }
            if let Err(e) = self.kev.refresh_if_stale().await {
                tracing::warn!("KEV refresh failed, proceeding without: {e}");
            }
        }

        for finding in findings.iter_mut() {
            let cves = extract_cves(finding);

            finding.epss = cves.iter().filter_map(|cve| self.epss.lookup(cve)).fold(
                None,
                |best: Option<dragnet_types::Epss>, epss| match best {
                    Some(best) if best.score >= epss.score => Some(best),
                    _ => Some(epss),
                },
            );

            if let Some(due) = cves.iter().find_map(|cve| self.kev.due_date(cve)) {
                finding.kev = true;
                finding.kev_due_date = Some(due);
            }

            apply_compliance(finding);
            finding.priority = score_priority(
                finding.severity,
                finding.epss.as_ref(),
                finding.kev,
                is_reachable(finding),
                &self.weights,
            );
        }
    }
}
