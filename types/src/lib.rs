//! Core domain types for Dragnet.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod diff;
mod finding;
mod fingerprint;
mod scan;
mod severity;
mod suppress;
mod target;

pub use diff::{
    DiffOptions, FieldChange, ModifiedFinding, RiskDelta, ScanDiff, TrendLabel, TrendThresholds,
};
pub use finding::{
    Compliance, Cvss, Epss, Finding, Location, Priority, PriorityComponents, ToolRef,
    sort_canonical,
};
pub use fingerprint::{
    FINGERPRINT_MESSAGE_PREFIX, Fingerprint, fingerprint, fingerprint_consensus, normalize_path,
};
pub use scan::{GitContext, Scan, ScanOutcome, SeverityCounts};
pub use severity::{Severity, SeverityParseError};
pub use suppress::{SuppressionMatch, SuppressionRule};
pub use target::{Target, TargetKind};

/// Version of the canonical finding schema emitted by the normalizer.
pub const SCHEMA_VERSION: &str = "1.0";
