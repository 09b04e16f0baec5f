//! Scan history: persistence, diffing, trend analysis.
//!
//! The store is SQLite in WAL mode - single writer, many readers, short
//! write transactions. Store failures never fail a scan; callers log and
//! move on. The diff engine and trend analyzer read what the store persists.

mod diff;
mod store;
mod trend;

pub use diff::diff_findings;
pub use store::{HistoryStore, ScanSummaryRow, StoreError};
pub use trend::{
    MIN_STATISTICAL_SAMPLES, RegressionReport, SecurityScore, TrendDirection, TrendReport,
    analyze_trend, letter_grade,
};
