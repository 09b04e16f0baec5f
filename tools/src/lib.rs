//! Scanner catalog and external-tool runner.
//!
//! The catalog is the closed set of supported scanners: command templates,
//! success exit-code sets, compatibility matrix, and pinned versions. The
//! runner spawns one tool against one target, enforces the deadline, caps
//! captured output, and classifies the outcome. It never retries; retry
//! policy belongs to the orchestrator.

pub mod catalog;
pub mod process;
pub mod runner;

pub use catalog::{ToolKind, extract_version};
pub use process::ChildGuard;
pub use runner::{RunError, RunOutcome, RunOutput, RunRequest, detect_tool_version, run_tool};
