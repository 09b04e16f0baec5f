//! The Tool Runner: one external tool, one target, one deadline.
//!
//! Responsibilities end at outcome classification. The runner never retries
//! (the orchestrator owns retry policy) and never parses output (adapters own
//! that). Deadlines are hard: polite termination on expiry, forceful after a
//! short grace period.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::watch;
use tokio::time;

use crate::catalog::{ToolKind, extract_version};
use crate::process::{ChildGuard, set_new_session};

/// Default cap on captured stdout per tool run.
pub const DEFAULT_MAX_STDOUT_BYTES: usize = 16 * 1024 * 1024;
/// Default cap on captured stderr per tool run.
pub const DEFAULT_MAX_STDERR_BYTES: usize = 1024 * 1024;
/// How long a politely-terminated process gets before SIGKILL.
const TERMINATION_GRACE: Duration = Duration::from_secs(2);
/// Deadline for version probes; a probe must never stall a scan.
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to run one tool once.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Binary name or path; resolved against PATH before spawning.
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Environment overrides layered on the inherited environment.
    pub env: Vec<(String, String)>,
    pub deadline: Duration,
    /// Exit codes that mean "ran fine"; zero means clean, non-zero members
    /// mean findings were produced.
    pub success_codes: Vec<i32>,
    pub max_stdout_bytes: usize,
    pub max_stderr_bytes: usize,
}

impl RunRequest {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, deadline: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
            env: Vec::new(),
            deadline,
            success_codes: vec![0],
            max_stdout_bytes: DEFAULT_MAX_STDOUT_BYTES,
            max_stderr_bytes: DEFAULT_MAX_STDERR_BYTES,
        }
    }
}

/// Terminal classification of one tool run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RunOutcome {
    /// Exit code 0.
    Success,
    /// Non-zero exit code declared a success code by the tool.
    SuccessWithFindings,
    /// Deadline expired; the process was terminated. Retriable.
    Timeout,
    /// Binary not found on PATH.
    NotFound,
    /// Killed by a signal it did not expect. Retriable.
    CrashedSignal,
    /// Non-zero exit code outside the success set. Fatal for the job.
    NonZeroNoFindings,
}

impl RunOutcome {
    /// Whether the orchestrator may re-enqueue the job.
    #[must_use]
    pub fn retriable(self) -> bool {
        matches!(self, RunOutcome::Timeout | RunOutcome::CrashedSignal)
    }

    #[must_use]
    pub fn succeeded(self) -> bool {
        matches!(self, RunOutcome::Success | RunOutcome::SuccessWithFindings)
    }
}

/// Captured result of one tool run.
#[derive(Debug)]
pub struct RunOutput {
    pub outcome: RunOutcome,
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub duration: Duration,
}

impl RunOutput {
    fn without_process(outcome: RunOutcome, duration: Duration) -> Self {
        Self {
            outcome,
            exit_code: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            stdout_truncated: false,
            stderr_truncated: false,
            duration,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("cancelled while running {tool}")]
    Cancelled { tool: String },
    #[error("failed to run {tool}: {message}")]
    Io { tool: String, message: String },
}

/// Run one tool to completion, enforcing the deadline and output caps.
///
/// `cancel` is the scan-wide cancellation signal; when it flips to `true`
/// the child is terminated (polite, then forceful) and `RunError::Cancelled`
/// is returned. A missing binary is an outcome, not an error, so the
/// orchestrator can apply its tool-missing policy.
pub async fn run_tool(
    req: RunRequest,
    mut cancel: Option<watch::Receiver<bool>>,
) -> Result<RunOutput, RunError> {
    let started = Instant::now();

    let Ok(binary) = which::which(&req.program) else {
        tracing::warn!(tool = %req.program, "tool binary not found on PATH");
        return Ok(RunOutput::without_process(
            RunOutcome::NotFound,
            started.elapsed(),
        ));
    };

    // Isolated scratch space for the tool; removed on drop, success or not.
    let workspace = tempfile::tempdir().map_err(|e| RunError::Io {
        tool: req.program.clone(),
        message: format!("failed to create job workspace: {e}"),
    })?;

    let mut cmd = Command::new(&binary);
    cmd.args(&req.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env("TMPDIR", workspace.path());
    if let Some(dir) = &req.working_dir {
        cmd.current_dir(dir);
    }
    for (key, value) in &req.env {
        cmd.env(key, value);
    }
    set_new_session(&mut cmd);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(RunOutput::without_process(
                RunOutcome::NotFound,
                started.elapsed(),
            ));
        }
        Err(e) => {
            return Err(RunError::Io {
                tool: req.program.clone(),
                message: format!("failed to spawn: {e}"),
            });
        }
    };
    let mut guard = ChildGuard::new(child);

    let stdout = guard.child_mut().stdout.take().ok_or_else(|| RunError::Io {
        tool: req.program.clone(),
        message: "failed to capture stdout".to_string(),
    })?;
    let stderr = guard.child_mut().stderr.take().ok_or_else(|| RunError::Io {
        tool: req.program.clone(),
        message: "failed to capture stderr".to_string(),
    })?;

    let stdout_task = tokio::spawn(read_to_end_limited(stdout, req.max_stdout_bytes));
    let stderr_task = tokio::spawn(read_to_end_limited(stderr, req.max_stderr_bytes));

    enum WaitResult {
        Exited(std::process::ExitStatus),
        DeadlineExpired,
        Cancelled,
    }

    let waited = {
        let wait = guard.child_mut().wait();
        tokio::pin!(wait);
        let cancelled = async {
            match cancel.as_mut() {
                Some(rx) => {
                    // Already-cancelled scans should not start the wait at all.
                    while !*rx.borrow() {
                        if rx.changed().await.is_err() {
                            // Sender gone: no cancellation will ever arrive.
                            std::future::pending::<()>().await;
                        }
                    }
                }
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            status = &mut wait => WaitResult::Exited(status.map_err(|e| RunError::Io {
                tool: req.program.clone(),
                message: e.to_string(),
            })?),
            () = time::sleep(req.deadline) => WaitResult::DeadlineExpired,
            () = cancelled => WaitResult::Cancelled,
        }
    };

    let status = match waited {
        WaitResult::Exited(status) => {
            guard.disarm();
            Some(status)
        }
        WaitResult::DeadlineExpired => {
            tracing::warn!(tool = %req.program, deadline_secs = req.deadline.as_secs(), "tool hit deadline, terminating");
            terminate_with_grace(&mut guard).await;
            None
        }
        WaitResult::Cancelled => {
            terminate_with_grace(&mut guard).await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(RunError::Cancelled {
                tool: req.program.clone(),
            });
        }
    };

    let (stdout_bytes, stdout_truncated) =
        stdout_task.await.unwrap_or_else(|_| (Vec::new(), false));
    let (stderr_bytes, stderr_truncated) =
        stderr_task.await.unwrap_or_else(|_| (Vec::new(), false));
    let duration = started.elapsed();

    let Some(status) = status else {
        return Ok(RunOutput {
            outcome: RunOutcome::Timeout,
            exit_code: None,
            stdout: stdout_bytes,
            stderr: stderr_bytes,
            stdout_truncated,
            stderr_truncated,
            duration,
        });
    };

    let outcome = classify_exit(&status, &req.success_codes);
    Ok(RunOutput {
        outcome,
        exit_code: status.code(),
        stdout: stdout_bytes,
        stderr: stderr_bytes,
        stdout_truncated,
        stderr_truncated,
        duration,
    })
}

/// SIGTERM, wait out the grace period, then SIGKILL and reap.
async fn terminate_with_grace(guard: &mut ChildGuard) {
    guard.terminate();
    if time::timeout(TERMINATION_GRACE, guard.child_mut().wait())
        .await
        .is_ok()
    {
        guard.disarm();
        return;
    }
    guard.kill();
    if time::timeout(TERMINATION_GRACE, guard.child_mut().wait())
        .await
        .is_ok()
    {
        guard.disarm();
    }
    // Still running after SIGKILL: leave the guard armed so Drop retries.
}

fn classify_exit(status: &std::process::ExitStatus, success_codes: &[i32]) -> RunOutcome {
    match status.code() {
        Some(0) => RunOutcome::Success,
        Some(code) if success_codes.contains(&code) => RunOutcome::SuccessWithFindings,
        Some(_) => RunOutcome::NonZeroNoFindings,
        // No exit code: terminated by a signal.
        None => RunOutcome::CrashedSignal,
    }
}

/// Read from `reader` up to `max` bytes; past the cap, keep draining (so the
/// child never blocks on a full pipe) but discard and mark truncated.
async fn read_to_end_limited<R: tokio::io::AsyncRead + Unpin + Send + 'static>(
    mut reader: R,
    max: usize,
) -> (Vec<u8>, bool) {
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    let mut truncated = false;
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if out.len() < max {
                    let take = n.min(max - out.len());
                    out.extend_from_slice(&buf[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else {
                    truncated = true;
                }
            }
            Err(_) => break,
        }
    }
    (out, truncated)
}

/// Probe a tool's installed version. Best-effort: `None` when the binary is
/// missing or the output has no version token.
pub async fn detect_tool_version(tool: ToolKind) -> Option<String> {
    let req = RunRequest {
        program: tool.binary().to_string(),
        args: tool.version_args().iter().map(|s| (*s).to_string()).collect(),
        working_dir: None,
        env: Vec::new(),
        deadline: VERSION_PROBE_TIMEOUT,
        success_codes: vec![0],
        max_stdout_bytes: 64 * 1024,
        max_stderr_bytes: 64 * 1024,
    };
    let output = run_tool(req, None).await.ok()?;
    if !output.outcome.succeeded() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    extract_version(&text).or_else(|| {
        let err_text = String::from_utf8_lossy(&output.stderr);
        extract_version(&err_text)
    })
}
