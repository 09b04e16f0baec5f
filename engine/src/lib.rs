//! Core engine for Dragnet - scan orchestration without any CLI dependency.
//!
//! The pipeline: discovery expands target specs into concrete targets, job
//! expansion crosses them with the compatible tools, the orchestrator runs
//! jobs on a bounded worker pool (deadlines, retries, cancellation), each
//! completed job is parsed and normalized on the worker that ran it, and the
//! scan assembly enriches, dedups, suppresses, and sorts the merged stream.

mod cancel;
mod dedup;
mod discovery;
mod gitctx;
mod jobs;
mod normalize;
mod orchestrator;
mod progress;
mod scan;
mod suppress;

pub use cancel::CancelHandle;
pub use dedup::dedup_findings;
pub use discovery::{DiscoveredTargets, discover, expand_url_file};
pub use jobs::{Job, JobRecord, expand_jobs};
pub use normalize::{NormalizeOutcome, normalize_shell};
pub use orchestrator::{OrchestratorOutput, run_jobs};
pub use progress::{Progress, ProgressTracker, ScanEvent};
pub use scan::{ScanOptions, ScanResult, run_scan};
pub use suppress::{SuppressionOutcome, SuppressionSet};

/// Fatal scan errors. Everything else - tool failures, bad targets, parse
/// problems, enrichment outages - degrades into warnings and per-job
/// outcomes recorded on the scan.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("a required tool is missing: {0}")]
    ToolMissing(String),
    #[error("suppression rule {rule_id} has an invalid path glob: {source}")]
    BadSuppressionGlob {
        rule_id: String,
        #[source]
        source: globset::Error,
    },
    #[error(transparent)]
    Config(#[from] dragnet_config::ConfigError),
}
