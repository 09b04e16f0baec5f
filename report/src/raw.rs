//! Raw tool payload retention:
//! `individual-<target-kind>/<sanitized-target>/<tool>.json`.

use std::path::{Path, PathBuf};

use dragnet_types::TargetKind;
use dragnet_utils::sanitize_for_path;

/// One tool run's raw stdout, queued for retention.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub target_kind: TargetKind,
    pub target_id: String,
    pub tool: String,
    pub bytes: Vec<u8>,
}

/// Deterministic on-disk location for a payload.
#[must_use]
pub fn payload_path(root: &Path, payload: &RawPayload) -> PathBuf {
    root.join(format!("individual-{}", payload.target_kind))
        .join(sanitize_for_path(&payload.target_id))
        .join(format!("{}.json", payload.tool))
}
