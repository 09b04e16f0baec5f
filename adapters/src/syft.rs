//! syft adapter (pinned 1.18).
//!
//! syft produces an SBOM (package inventory), not defects, so this adapter
//! emits no findings. The raw payload is still retained on disk by the
//! report layer, and grype consumes the same targets for vulnerability
//! matching. A document without an `artifacts` array is still a shape
//! warning so a broken run is visible.

use serde_json::Value;

use dragnet_types::Target;

use crate::ParseOutput;

pub(crate) fn parse(docs: &[Value], _target: &Target, out: &mut ParseOutput) {
    for doc in docs {
        let Some(artifacts) = doc.get("artifacts").and_then(Value::as_array) else {
            out.warn("syft", "document has no artifacts array");
            continue;
        };
        tracing::debug!(packages = artifacts.len(), "syft SBOM parsed");
    }
}
