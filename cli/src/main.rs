//! Dragnet CLI - binary entry point.
//!
//! The surface is deliberately thin: argument parsing, tracing setup, and
//! command dispatch. All scanning logic lives in [`dragnet_engine`]; all
//! persistence in [`dragnet_history`]; all rendering in [`dragnet_report`].

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dragnet_config::{Concurrency, DragnetConfig};
use dragnet_engine::{CancelHandle, ScanEvent, ScanOptions, ScanResult, run_scan};
use dragnet_history::{HistoryStore, analyze_trend, diff_findings};
use dragnet_report::{JobTiming, RawPayload, ReportInputs, ReportWriter};
use dragnet_types::{DiffOptions, Severity, Target};

#[derive(Parser)]
#[command(name = "dragnet", version, about = "Security-scan orchestrator")]
struct Cli {
    /// Config file path (defaults to ./dragnet.toml, then the user config
    /// directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scan and write reports.
    Scan(ScanArgs),
    /// Run a scan and exit non-zero when findings reach the gate severity.
    Ci(ScanArgs),
    /// Compare two stored scans by fingerprint.
    Diff(DiffArgs),
    /// Inspect stored scan history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Statistical trend over a branch's history.
    Trend {
        #[arg(long)]
        branch: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Repository or directory targets.
    targets: Vec<PathBuf>,
    /// Container image references.
    #[arg(long)]
    image: Vec<String>,
    /// IaC files or directories.
    #[arg(long)]
    iac: Vec<PathBuf>,
    /// URLs for DAST probes.
    #[arg(long)]
    url: Vec<String>,
    /// File with one URL per line.
    #[arg(long)]
    url_file: Option<PathBuf>,
    /// Kubernetes contexts to audit.
    #[arg(long)]
    kube_context: Vec<String>,

    #[arg(long)]
    profile: Option<String>,
    /// Override the profile's tool list (comma-separated).
    #[arg(long, value_delimiter = ',')]
    tools: Vec<String>,
    #[arg(long)]
    concurrency: Option<usize>,
    /// Default per-tool timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
    /// Default per-tool retry budget.
    #[arg(long)]
    retries: Option<u32>,
    /// Results directory.
    #[arg(long, default_value = "dragnet-results")]
    output: PathBuf,
    /// Gate severity (ci mode): INFO, LOW, MEDIUM, HIGH, CRITICAL.
    #[arg(long)]
    fail_on: Option<Severity>,
    /// Skip EPSS/KEV network lookups.
    #[arg(long)]
    offline: bool,
    /// Fail the scan when a tool binary is missing instead of stubbing it.
    #[arg(long)]
    fail_on_missing_tool: bool,
    /// Whole-scan deadline in seconds.
    #[arg(long)]
    deadline: Option<u64>,
    /// Write per-job timings.json.
    #[arg(long)]
    timings: bool,
    /// Do not record this scan in history.
    #[arg(long)]
    no_history: bool,
    /// Suppress per-job progress output.
    #[arg(long)]
    quiet: bool,
}

#[derive(Args)]
struct DiffArgs {
    baseline: String,
    current: String,
    #[arg(long)]
    min_severity: Option<Severity>,
    /// Restrict to these tools (comma-separated).
    #[arg(long, value_delimiter = ',')]
    tool: Vec<String>,
    /// Treat every shared fingerprint as unchanged.
    #[arg(long)]
    no_modifications: bool,
    /// Emit the full diff as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List stored scans, newest first.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        branch: Option<String>,
    },
    /// Show one scan in full.
    Show {
        scan_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Delete old scans.
    Prune {
        #[arg(long, conflicts_with = "older_than_days")]
        keep_last: Option<usize>,
        #[arg(long)]
        older_than_days: Option<u64>,
    },
    /// Check stored digests against stored findings.
    Verify,
    /// Reclaim database space.
    Vacuum,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            2
        }
    };
    ExitCode::from(code)
}

async fn run(cli: Cli) -> Result<u8> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Scan(args) => scan_command(config, args, false).await,
        Command::Ci(args) => scan_command(config, args, true).await,
        Command::Diff(args) => diff_command(&config, &args),
        Command::History { action } => history_command(&config, action),
        Command::Trend { branch, limit } => trend_command(&config, branch.as_deref(), limit),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<DragnetConfig> {
    match path {
        Some(path) => Ok(DragnetConfig::load_from(path)?),
        None => Ok(DragnetConfig::load()?),
    }
}

fn collect_targets(args: &ScanArgs) -> Result<Vec<Target>> {
    let mut specs = Vec::new();
    for path in &args.targets {
        specs.push(Target::Repo { path: path.clone() });
    }
    for reference in &args.image {
        specs.push(Target::Image {
            reference: reference.clone(),
        });
    }
    for path in &args.iac {
        specs.push(Target::Iac { path: path.clone() });
    }
    for url in &args.url {
        specs.push(Target::Url { url: url.clone() });
    }
    if let Some(url_file) = &args.url_file {
        specs.extend(
            dragnet_engine::expand_url_file(url_file)
                .with_context(|| format!("failed to read url file {}", url_file.display()))?,
        );
    }
    for context in &args.kube_context {
        specs.push(Target::Kubernetes {
            context: context.clone(),
            namespace: None,
        });
    }
    if specs.is_empty() {
        specs.push(Target::Repo {
            path: PathBuf::from("."),
        });
    }
    Ok(specs)
}

fn apply_overrides(config: &mut DragnetConfig, args: &ScanArgs) {
    if let Some(profile) = &args.profile {
        config.profile = profile.clone();
    }
    if !args.tools.is_empty() {
        config.tools = args.tools.clone();
    }
    if let Some(n) = args.concurrency {
        config.concurrency = Concurrency::Fixed(n);
    }
    if let Some(timeout) = args.timeout {
        config.timeout = Some(timeout);
    }
    if let Some(retries) = args.retries {
        config.retries = Some(retries);
    }
    if let Some(fail_on) = args.fail_on {
        config.fail_on = Some(fail_on);
    }
    if args.fail_on_missing_tool {
        config.fail_on_missing_tool = true;
    }
}

async fn scan_command(mut config: DragnetConfig, args: ScanArgs, gate: bool) -> Result<u8> {
    apply_overrides(&mut config, &args);
    let specs = collect_targets(&args)?;

    let cancel = CancelHandle::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("interrupt received, cancelling scan...");
                cancel.cancel();
            }
        });
    }

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = if args.quiet {
        None
    } else {
        Some(tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                print_event(&event);
            }
        }))
    };

    let mut options = ScanOptions::new(config.clone());
    options.cancel = cancel;
    options.offline_enrichment = args.offline;
    options.global_deadline = args.deadline.map(std::time::Duration::from_secs);
    if !args.quiet {
        options.events = Some(events_tx);
    } else {
        drop(events_tx);
    }

    let result = run_scan(&specs, options).await?;
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    write_reports(&args.output, &result, args.timings)?;

    if config.history.enabled && !args.no_history {
        record_history(&config, &result);
    }

    println!(
        "scan {} {}: {} findings ({} suppressed) in {:.1}s -> {}",
        result.scan.scan_id,
        result.scan.outcome,
        result.findings.len(),
        result.suppressed.len(),
        result.scan.duration_ms as f64 / 1000.0,
        args.output.join("summaries").display(),
    );

    if gate {
        // In ci mode an unset gate still gates: HIGH is the floor.
        let floor = config.fail_on.unwrap_or(Severity::High);
        let gated = result.scan.summary.at_or_above(floor);
        if gated > 0 {
            eprintln!("gate failed: {gated} finding(s) at or above {floor}");
            return Ok(1);
        }
    }
    Ok(0)
}

fn write_reports(output: &std::path::Path, result: &ScanResult, timings: bool) -> Result<()> {
    let writer = ReportWriter::new(output);

    let raw_payloads: Vec<RawPayload> = result
        .records
        .iter()
        .filter(|r| !r.raw_stdout.is_empty())
        .map(|r| RawPayload {
            target_kind: r.job.target.kind(),
            target_id: r.job.target.identifier(),
            tool: r.job.tool.name().to_string(),
            bytes: r.raw_stdout.clone(),
        })
        .collect();
    let timing_rows: Vec<JobTiming> = result
        .records
        .iter()
        .map(|r| JobTiming {
            tool: r.job.tool.name().to_string(),
            target: r.job.target.identifier(),
            outcome: format!("{:?}", r.outcome),
            attempts: r.attempts,
            duration_ms: r.duration.as_millis() as u64,
        })
        .collect();

    writer
        .write_all(&ReportInputs {
            scan: &result.scan,
            findings: &result.findings,
            suppressed: &result.suppressed,
            unused_rules: &result.unused_rules,
            timings: timings.then_some(timing_rows.as_slice()),
            raw_payloads: &raw_payloads,
            baseline: None,
        })
        .context("primary report sink failed; scan output was not written")?;
    Ok(())
}

/// Store failures are logged, never fatal: the report on disk is the source
/// of truth for this scan.
fn record_history(config: &DragnetConfig, result: &ScanResult) {
    let path = config.history_db_path();
    match HistoryStore::open(&path) {
        Ok(mut store) => {
            if let Err(e) = store.store_scan(&result.scan, &result.findings) {
                tracing::warn!(path = %path.display(), "failed to record scan in history: {e}");
            }
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "history store unavailable: {e}");
        }
    }
}

fn print_event(event: &ScanEvent) {
    match event {
        ScanEvent::JobStarted {
            tool,
            target,
            attempt,
        } => {
            if *attempt > 1 {
                eprintln!("  {tool} {target} (attempt {attempt})");
            } else {
                eprintln!("  {tool} {target}");
            }
        }
        ScanEvent::JobFinished {
            tool,
            outcome,
            duration,
            ..
        } => {
            eprintln!("  {tool} finished: {outcome:?} in {:.1}s", duration.as_secs_f64());
        }
        ScanEvent::Progress(progress) => {
            let eta = progress
                .estimated_remaining
                .map(|d| format!(", ~{:.0}s left", d.as_secs_f64()))
                .unwrap_or_default();
            eprintln!("[{}/{}{eta}]", progress.completed, progress.total);
        }
    }
}

fn open_store(config: &DragnetConfig) -> Result<HistoryStore> {
    let path = config.history_db_path();
    HistoryStore::open(&path)
        .with_context(|| format!("failed to open history store at {}", path.display()))
}

fn diff_command(config: &DragnetConfig, args: &DiffArgs) -> Result<u8> {
    let store = open_store(config)?;
    let Some((baseline, current)) = store.compare(&args.baseline, &args.current)? else {
        bail!("unknown scan id (see `dragnet history list`)");
    };

    let options = DiffOptions {
        min_severity: args.min_severity,
        tools: args.tool.clone(),
        detect_modifications: !args.no_modifications,
    };
    let diff = diff_findings(baseline, current, &options);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
        return Ok(0);
    }

    println!(
        "diff {} -> {}: {} new, {} resolved, {} modified, {} unchanged ({:?})",
        args.baseline,
        args.current,
        diff.new.len(),
        diff.resolved.len(),
        diff.modified.len(),
        diff.unchanged.len(),
        diff.trend.expect("diff always labels the trend"),
    );
    for finding in &diff.new {
        println!("  + [{}] {} at {}", finding.severity, finding.rule_id, finding.location.path);
    }
    for finding in &diff.resolved {
        println!("  - [{}] {} at {}", finding.severity, finding.rule_id, finding.location.path);
    }
    for modified in &diff.modified {
        let f = &modified.finding;
        let changes: Vec<String> = modified
            .changes
            .iter()
            .map(|c| format!("{}: {} -> {}", c.field, c.old, c.new))
            .collect();
        println!(
            "  ~ [{}] {} at {} ({:?}; {})",
            f.severity,
            f.rule_id,
            f.location.path,
            modified.risk_delta,
            changes.join(", "),
        );
    }
    Ok(0)
}

fn history_command(config: &DragnetConfig, action: HistoryAction) -> Result<u8> {
    match action {
        HistoryAction::List { limit, branch } => {
            let store = open_store(config)?;
            let rows = store.list_scans(limit, branch.as_deref())?;
            if rows.is_empty() {
                println!("no scans recorded");
                return Ok(0);
            }
            for row in rows {
                let when = chrono::DateTime::from_timestamp_millis(row.timestamp_ms)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| row.timestamp_ms.to_string());
                println!(
                    "{}  {}  {:9}  {:4} findings  C:{} H:{} M:{}  {}",
                    row.scan_id,
                    when,
                    row.outcome,
                    row.finding_count,
                    row.summary.critical,
                    row.summary.high,
                    row.summary.medium,
                    row.branch.as_deref().unwrap_or("-"),
                );
            }
        }
        HistoryAction::Show { scan_id, json } => {
            let store = open_store(config)?;
            let Some((scan, findings)) = store.get_scan(&scan_id)? else {
                bail!("unknown scan id: {scan_id}");
            };
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "scan": scan,
                        "findings": findings,
                    }))?
                );
            } else {
                println!(
                    "scan {} ({}, {} findings, {:.1}s)",
                    scan.scan_id,
                    scan.outcome,
                    findings.len(),
                    scan.duration_ms as f64 / 1000.0,
                );
                for finding in &findings {
                    println!(
                        "  [{}] {} at {} ({})",
                        finding.severity,
                        finding.rule_id,
                        finding.location.path,
                        finding.tool.name,
                    );
                }
            }
        }
        HistoryAction::Prune {
            keep_last,
            older_than_days,
        } => {
            let mut store = open_store(config)?;
            let deleted = match (keep_last, older_than_days) {
                (Some(n), None) => store.prune_keep_last(n)?,
                (None, Some(days)) => {
                    store.prune_older_than_days(days, chrono::Utc::now().timestamp_millis())?
                }
                _ => bail!("pass exactly one of --keep-last or --older-than-days"),
            };
            store.vacuum()?;
            println!("pruned {deleted} scan(s)");
        }
        HistoryAction::Verify => {
            let store = open_store(config)?;
            let corrupt = store.verify()?;
            if corrupt.is_empty() {
                println!("history verified: all digests match");
            } else {
                for scan_id in &corrupt {
                    eprintln!("digest mismatch: {scan_id}");
                }
                return Ok(1);
            }
        }
        HistoryAction::Vacuum => {
            let store = open_store(config)?;
            store.vacuum()?;
            println!("vacuum complete");
        }
    }
    Ok(0)
}

fn trend_command(config: &DragnetConfig, branch: Option<&str>, limit: usize) -> Result<u8> {
    let store = open_store(config)?;
    let mut rows = store.list_scans(limit, branch)?;
    rows.reverse(); // oldest first for the analyzer

    let series: Vec<(i64, dragnet_types::SeverityCounts)> = rows
        .iter()
        .map(|row| (row.timestamp_ms, row.summary))
        .collect();
    let report = analyze_trend(&series, None);

    println!(
        "trend over {} scan(s){}",
        report.sample_count,
        branch.map(|b| format!(" on {b}")).unwrap_or_default(),
    );
    match (report.direction, report.p_value) {
        (Some(direction), Some(p)) => println!("direction: {direction:?} (p = {p:.4})"),
        _ => println!(
            "direction: not enough samples for statistics (need {})",
            dragnet_history::MIN_STATISTICAL_SAMPLES
        ),
    }
    println!(
        "security score: {:.1} (grade {})",
        report.score.score, report.score.grade
    );
    if let Some(regressions) = report.regressions
        && regressions.regressed
    {
        println!(
            "regression: {} net-new HIGH/CRITICAL vs rolling baseline",
            regressions.regressions
        );
    }
    Ok(0)
}
