//! Scan assembly: the full pipeline from target specs to a sorted,
//! enriched, suppressed finding set plus the scan record.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use dragnet_config::DragnetConfig;
use dragnet_enrich::Enricher;
use dragnet_tools::{RunOutcome, ToolKind, detect_tool_version};
use dragnet_types::{
    Finding, Location, Scan, ScanOutcome, SeverityCounts, SuppressionMatch, Target, ToolRef,
    fingerprint, sort_canonical,
};

use crate::cancel::CancelHandle;
use crate::dedup::dedup_findings;
use crate::discovery::discover;
use crate::jobs::{JobRecord, expand_jobs};
use crate::orchestrator::{is_job_failure, run_jobs};
use crate::progress::ScanEvent;
use crate::suppress::SuppressionSet;
use crate::{ScanError, SuppressionOutcome};

/// Everything a scan run needs beyond the target list.
pub struct ScanOptions {
    pub config: DragnetConfig,
    pub cancel: CancelHandle,
    pub events: Option<mpsc::UnboundedSender<ScanEvent>>,
    /// Skip network enrichment (tests, air-gapped runs).
    pub offline_enrichment: bool,
    /// Optional whole-scan deadline; auto-triggers the cancel handle.
    pub global_deadline: Option<Duration>,
}

impl ScanOptions {
    #[must_use]
    pub fn new(config: DragnetConfig) -> Self {
        Self {
            config,
            cancel: CancelHandle::new(),
            events: None,
            offline_enrichment: false,
            global_deadline: None,
        }
    }
}

/// The assembled result of one scan.
#[derive(Debug)]
pub struct ScanResult {
    pub scan: Scan,
    pub findings: Vec<Finding>,
    pub suppressed: Vec<SuppressionMatch>,
    pub unused_rules: Vec<String>,
    pub records: Vec<JobRecord>,
}

/// Run one scan end to end.
pub async fn run_scan(specs: &[Target], options: ScanOptions) -> Result<ScanResult, ScanError> {
    let started = Instant::now();
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    let scan_id = uuid::Uuid::new_v4().simple().to_string();
    let ScanOptions {
        config,
        cancel,
        events,
        offline_enrichment,
        global_deadline,
    } = options;

    let profile = config.effective_profile()?;
    tracing::info!(%scan_id, profile = %profile.name, "scan starting");

    if let Some(deadline) = global_deadline {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            tracing::warn!("global scan deadline reached; cancelling");
            cancel.cancel();
        });
    }

    // Resolve the tool list; unknown names are warnings, not failures.
    let mut warnings = Vec::new();
    let mut tools: Vec<ToolKind> = Vec::new();
    for name in &profile.tools {
        match name.parse::<ToolKind>() {
            Ok(tool) => tools.push(tool),
            Err(_) => warnings.push(format!("unknown tool in profile: {name}")),
        }
    }

    let discovered = discover(specs, &config.include, &config.exclude);
    warnings.extend(discovered.warnings);
    let targets = discovered.targets;

    let git_context = match targets.iter().find_map(Target::root) {
        Some(root) => crate::gitctx::capture(root).await,
        None => None,
    };

    // One version probe per distinct tool, reused across every job.
    let mut tool_versions: HashMap<ToolKind, Option<String>> = HashMap::new();
    for tool in &tools {
        let version = detect_tool_version(*tool).await;
        tool_versions.insert(*tool, version);
    }

    let jobs = expand_jobs(&targets, &tools, &config, &profile);
    let total_jobs = jobs.len();
    tracing::info!(targets = targets.len(), jobs = total_jobs, "scan expanded");

    let pool = run_jobs(
        jobs,
        config.concurrency.effective(),
        tool_versions.clone(),
        &cancel,
        events,
    )
    .await;
    let mut findings = pool.findings;
    warnings.extend(pool.warnings);

    // Tool-missing policy: fail the scan, or stub a marker per skipped job.
    let missing: Vec<&JobRecord> = pool
        .records
        .iter()
        .filter(|r| r.outcome == RunOutcome::NotFound)
        .collect();
    if !missing.is_empty() {
        if config.fail_on_missing_tool {
            let tool = missing[0].job.tool.name().to_string();
            return Err(ScanError::ToolMissing(tool));
        }
        for record in missing {
            findings.push(missing_tool_stub(record));
        }
    }

    let cache_dir = config.enrichment_cache_dir();
    let mut enricher = Enricher::new(
        &cache_dir,
        config.epss.ttl_days,
        config.kev.refresh_days,
        config.priority,
    );
    if offline_enrichment {
        enricher = enricher.offline();
    }
    enricher.enrich(&mut findings).await;

    let findings = dedup_findings(findings);

    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let SuppressionOutcome {
        kept: mut findings,
        suppressed,
        unused_rules,
    } = SuppressionSet::compile(&config.suppressions, &today)?.apply(findings);

    sort_canonical(&mut findings);

    let mut summary = SeverityCounts::default();
    for finding in &findings {
        summary.record(finding.severity);
    }

    let mut attempts: BTreeMap<String, u32> = BTreeMap::new();
    for record in &pool.records {
        *attempts.entry(record.job.tool.name().to_string()).or_default() += record.attempts;
    }

    let outcome = if pool.cancelled {
        ScanOutcome::Cancelled
    } else if pool.records.iter().any(|r| is_job_failure(r.outcome)) {
        ScanOutcome::Partial
    } else {
        ScanOutcome::Completed
    };
    tracing::info!(
        %scan_id,
        %outcome,
        findings = findings.len(),
        suppressed = suppressed.len(),
        "scan finished"
    );

    let scan = Scan {
        scan_id,
        timestamp_ms,
        profile_name: profile.name,
        tools_requested: tools.iter().map(|t| t.name().to_string()).collect(),
        targets,
        git_context,
        summary,
        duration_ms: started.elapsed().as_millis() as u64,
        outcome,
        attempts,
        warnings,
    };

    Ok(ScanResult {
        scan,
        findings,
        suppressed,
        unused_rules,
        records: pool.records,
    })
}

/// The stub recorded when a tool binary is missing and the run-level policy
/// says to continue.
fn missing_tool_stub(record: &JobRecord) -> Finding {
    let tool_name = record.job.tool.name();
    let target_id = record.job.target.identifier();
    let rule_id = "dragnet-tool-missing";
    let message = format!("{tool_name} is not installed; {target_id} was not scanned by it");
    let id = fingerprint(tool_name, rule_id, &target_id, None, &message);

    Finding {
        schema_version: dragnet_types::SCHEMA_VERSION.to_string(),
        id,
        rule_id: rule_id.to_string(),
        severity: dragnet_types::Severity::Info,
        tool: ToolRef::new(tool_name, None),
        location: Location::new(target_id),
        message,
        title: Some(format!("{tool_name} missing")),
        description: None,
        remediation: Some(format!("Install {tool_name} or drop it from the profile")),
        references: Vec::new(),
        tags: vec!["tool-missing".to_string()],
        cvss: None,
        context: None,
        compliance: dragnet_types::Compliance::default(),
        epss: None,
        kev: false,
        kev_due_date: None,
        priority: dragnet_types::Priority::default(),
        detected_by: vec![ToolRef::new(tool_name, None)],
        raw: Vec::new(),
    }
}
