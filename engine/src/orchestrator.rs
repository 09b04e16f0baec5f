//! The worker pool.
//!
//! A fixed number of workers share one FIFO job queue, one results channel,
//! and one cancellation signal - nothing else. Each worker owns one tool
//! runner at a time and runs the parse/normalize stage inline for the job it
//! just finished; the merged output is order-independent, so whichever
//! worker finishes first simply reports first.
//!
//! Retries re-enqueue the job at the back of the queue (Timeout and
//! CrashedSignal only). Progress is recomputed after every terminal job
//! completion and is side-effect-free with respect to scheduling.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use dragnet_tools::{RunError, RunOutcome, RunRequest, ToolKind, run_tool};
use dragnet_types::{Finding, ToolRef};

use crate::cancel::CancelHandle;
use crate::jobs::{Job, JobRecord};
use crate::normalize::{NormalizeOutcome, normalize_shell};
use crate::progress::{ProgressTracker, ScanEvent};

/// Everything the pool produced for one scan.
#[derive(Debug, Default)]
pub struct OrchestratorOutput {
    pub records: Vec<JobRecord>,
    pub findings: Vec<Finding>,
    pub warnings: Vec<String>,
    /// True when the scan stopped because of cancellation; records then
    /// cover only the jobs that finished before the stop.
    pub cancelled: bool,
}

enum WorkerMsg {
    Event(ScanEvent),
    Done {
        record: JobRecord,
        findings: Vec<Finding>,
        warnings: Vec<String>,
    },
}

/// Run all jobs on a pool of `concurrency` workers.
pub async fn run_jobs(
    jobs: Vec<Job>,
    concurrency: usize,
    tool_versions: HashMap<ToolKind, Option<String>>,
    cancel: &CancelHandle,
    events: Option<mpsc::UnboundedSender<ScanEvent>>,
) -> OrchestratorOutput {
    let total = jobs.len();
    let queue = Arc::new(Mutex::new(VecDeque::from(jobs)));
    let versions = Arc::new(tool_versions);
    let (tx, mut rx) = mpsc::unbounded_channel::<WorkerMsg>();

    let workers = concurrency.max(1);
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let versions = Arc::clone(&versions);
        let tx = tx.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            worker_loop(&queue, &versions, &tx, &cancel).await;
        }));
    }
    drop(tx);

    let mut tracker = ProgressTracker::new(total);
    let mut out = OrchestratorOutput::default();
    while let Some(msg) = rx.recv().await {
        match msg {
            WorkerMsg::Event(event) => {
                if let Some(events) = &events {
                    let _ = events.send(event);
                }
            }
            WorkerMsg::Done {
                record,
                findings,
                warnings,
            } => {
                let progress = tracker.record(record.duration);
                if let Some(events) = &events {
                    let _ = events.send(ScanEvent::JobFinished {
                        tool: record.job.tool.name().to_string(),
                        target: record.job.target.identifier(),
                        outcome: record.outcome,
                        duration: record.duration,
                    });
                    let _ = events.send(ScanEvent::Progress(progress));
                }
                out.records.push(record);
                out.findings.extend(findings);
                out.warnings.extend(warnings);
            }
        }
    }
    for handle in handles {
        let _ = handle.await;
    }

    out.cancelled = cancel.is_cancelled();
    // Stable record order for reports, independent of completion order.
    out.records.sort_by_key(|r| r.job.id);
    out
}

async fn worker_loop(
    queue: &Mutex<VecDeque<Job>>,
    versions: &HashMap<ToolKind, Option<String>>,
    tx: &mpsc::UnboundedSender<WorkerMsg>,
    cancel: &CancelHandle,
) {
    loop {
        if cancel.is_cancelled() {
            // Drain: leave remaining queued jobs unclaimed.
            return;
        }
        let Some(job) = queue.lock().expect("job queue lock").pop_front() else {
            return;
        };

        let _ = tx.send(WorkerMsg::Event(ScanEvent::JobStarted {
            tool: job.tool.name().to_string(),
            target: job.target.identifier(),
            attempt: job.attempt,
        }));

        let request = build_request(&job);
        match run_tool(request, Some(cancel.subscribe())).await {
            Err(RunError::Cancelled { .. }) => return,
            Err(RunError::Io { tool, message }) => {
                tracing::warn!(%tool, "job infrastructure failure: {message}");
                handle_retriable(job, RunOutcome::CrashedSignal, queue, tx);
            }
            Ok(output) if output.outcome.retriable() && job.retries_remaining() => {
                tracing::info!(
                    tool = job.tool.name(),
                    attempt = job.attempt,
                    outcome = ?output.outcome,
                    "re-enqueueing job for retry"
                );
                queue
                    .lock()
                    .expect("job queue lock")
                    .push_back(job.next_attempt());
            }
            Ok(output) => {
                let (record, findings, warnings) = finish_job(job, output, versions);
                let _ = tx.send(WorkerMsg::Done {
                    record,
                    findings,
                    warnings,
                });
            }
        }
    }
}

/// An IO failure consumes an attempt like a crash does.
fn handle_retriable(
    job: Job,
    outcome: RunOutcome,
    queue: &Mutex<VecDeque<Job>>,
    tx: &mpsc::UnboundedSender<WorkerMsg>,
) {
    if job.retries_remaining() {
        queue
            .lock()
            .expect("job queue lock")
            .push_back(job.next_attempt());
        return;
    }
    let attempts = job.attempt;
    let record = JobRecord {
        job,
        outcome,
        attempts,
        duration: std::time::Duration::ZERO,
        raw_stdout: Vec::new(),
        stdout_truncated: false,
    };
    let _ = tx.send(WorkerMsg::Done {
        record,
        findings: Vec::new(),
        warnings: Vec::new(),
    });
}

fn build_request(job: &Job) -> RunRequest {
    let mut args = job.tool.scan_args(&job.target);
    args.extend(job.flags.iter().cloned());
    let mut request = RunRequest::new(job.tool.binary(), args, job.timeout);
    request.success_codes = job.success_codes.clone();
    request.env = job.tool.env_overrides(&job.target);
    request.working_dir = job.target.root().map(std::path::Path::to_path_buf);
    request
}

/// Parse and normalize on the worker that ran the job.
fn finish_job(
    job: Job,
    output: dragnet_tools::RunOutput,
    versions: &HashMap<ToolKind, Option<String>>,
) -> (JobRecord, Vec<Finding>, Vec<String>) {
    let mut findings = Vec::new();
    let mut warnings = Vec::new();

    if output.stdout_truncated {
        warnings.push(format!(
            "{}: output exceeded the capture cap and was truncated",
            job.tool.name()
        ));
    }

    if output.outcome.succeeded() {
        let tool_ref = ToolRef::new(
            job.tool.name(),
            versions.get(&job.tool).cloned().flatten(),
        );
        let parsed = dragnet_adapters::parse(job.tool, &output.stdout, &job.target);
        for warning in parsed.warnings {
            warnings.push(format!("{}: {}", warning.tool, warning.message));
        }
        for shell in parsed.findings {
            match normalize_shell(&tool_ref, &job.target, shell) {
                NormalizeOutcome::Finding(finding) => findings.push(*finding),
                NormalizeOutcome::Rejected { reason } => warnings.push(reason),
            }
        }
    } else {
        warnings.push(describe_failure(&job, &output));
    }

    let attempts = job.attempt;
    let record = JobRecord {
        job,
        outcome: output.outcome,
        attempts,
        duration: output.duration,
        raw_stdout: output.stdout,
        stdout_truncated: output.stdout_truncated,
    };
    (record, findings, warnings)
}

fn describe_failure(job: &Job, output: &dragnet_tools::RunOutput) -> String {
    let tool = job.tool.name();
    let target = job.target.identifier();
    match output.outcome {
        RunOutcome::Timeout => format!(
            "{tool} timed out after {}s on {target} (attempt {})",
            job.timeout.as_secs(),
            job.attempt
        ),
        RunOutcome::NotFound => format!("{tool} is not installed; skipped {target}"),
        RunOutcome::CrashedSignal => {
            format!("{tool} crashed on {target} (attempt {})", job.attempt)
        }
        RunOutcome::NonZeroNoFindings => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().next().unwrap_or("no stderr");
            format!(
                "{tool} failed on {target} with exit code {:?}: {detail}",
                output.exit_code
            )
        }
        RunOutcome::Success | RunOutcome::SuccessWithFindings => String::new(),
    }
}

/// Whether `outcome` counts against scan completion.
#[must_use]
pub(crate) fn is_job_failure(outcome: RunOutcome) -> bool {
    matches!(
        outcome,
        RunOutcome::Timeout | RunOutcome::CrashedSignal | RunOutcome::NonZeroNoFindings
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::run_jobs;
    use crate::cancel::CancelHandle;
    use crate::jobs::Job;
    use dragnet_tools::{RunOutcome, ToolKind};
    use dragnet_types::Target;

    // The pool is exercised against real processes in the crate's
    // integration tests (with `sh` standing in for scanners); here we cover
    // the pure pieces reachable without a binary on PATH.

    fn missing_tool_job(id: usize) -> Job {
        Job {
            id,
            tool: ToolKind::KubeBench,
            target: Target::Kubernetes {
                context: "test".to_string(),
                namespace: None,
            },
            attempt: 1,
            max_attempts: 1,
            timeout: Duration::from_secs(5),
            flags: Vec::new(),
            success_codes: vec![0],
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn missing_binaries_produce_not_found_records() {
        // kube-bench is not installed in CI; every job must terminate with
        // NotFound rather than hang or error.
        let jobs = vec![missing_tool_job(0), missing_tool_job(1)];
        let cancel = CancelHandle::new();
        let out = run_jobs(jobs, 4, HashMap::new(), &cancel, None).await;

        assert_eq!(out.records.len(), 2);
        assert!(
            out.records
                .iter()
                .all(|r| r.outcome == RunOutcome::NotFound)
        );
        assert!(!out.cancelled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pre_cancelled_scan_runs_nothing() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let out = run_jobs(vec![missing_tool_job(0)], 2, HashMap::new(), &cancel, None).await;
        assert!(out.records.is_empty());
        assert!(out.cancelled);
    }
}
