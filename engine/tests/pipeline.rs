//! End-to-end pipeline tests with fake scanners.
//!
//! Real scanner binaries are not available (or wanted) in CI, so each test
//! installs shell-script stand-ins on PATH. PATH is process-global, so the
//! tests serialize on a lock and restore it before releasing.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use dragnet_config::{Concurrency, DragnetConfig, ToolOverrides};
use dragnet_engine::{CancelHandle, ScanOptions, ScanResult, run_scan};
use dragnet_types::{ScanOutcome, Severity, Target};

fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Scoped PATH override; restores the original on drop.
struct PathOverride {
    original: Option<std::ffi::OsString>,
    _guard: MutexGuard<'static, ()>,
}

impl PathOverride {
    fn prepend(dir: &Path) -> Self {
        let guard = env_lock();
        let original = std::env::var_os("PATH");
        let mut paths = vec![dir.to_path_buf()];
        if let Some(existing) = &original {
            paths.extend(std::env::split_paths(existing));
        }
        let joined = std::env::join_paths(paths).expect("joinable PATH");
        // SAFETY: serialized by env_lock; no other thread reads PATH while
        // a PathOverride is alive.
        unsafe { std::env::set_var("PATH", &joined) };
        Self {
            original,
            _guard: guard,
        }
    }

    /// Replace PATH entirely so no real tool can be found.
    fn exclusive(dir: &Path) -> Self {
        let guard = env_lock();
        let original = std::env::var_os("PATH");
        // SAFETY: as above.
        unsafe { std::env::set_var("PATH", dir) };
        Self {
            original,
            _guard: guard,
        }
    }
}

impl Drop for PathOverride {
    fn drop(&mut self) {
        // SAFETY: still holding env_lock.
        unsafe {
            match &self.original {
                Some(original) => std::env::set_var("PATH", original),
                None => std::env::remove_var("PATH"),
            }
        }
    }
}

fn install_fake_tool(bin_dir: &Path, name: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    let path = bin_dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("make fake tool executable");
}

/// gitleaks stand-in reporting one AWS key in secret.py.
const FAKE_GITLEAKS_FINDING: &str = r#"case "$1" in
  --version) echo "gitleaks version 8.21.2"; exit 0;;
esac
cat <<'EOF'
[{"RuleID":"aws-access-token","Description":"AWS Access Key","File":"secret.py","StartLine":3,"EndLine":3,"Tags":["key","AWS"]}]
EOF
exit 1"#;

const FAKE_GITLEAKS_CLEAN: &str = r#"case "$1" in
  --version) echo "gitleaks version 8.21.2"; exit 0;;
esac
echo "[]"
exit 0"#;

const FAKE_TRUFFLEHOG_FINDING: &str = r#"case "$1" in
  --version) echo "trufflehog 3.82.1"; exit 0;;
esac
printf '%s\n' '{"DetectorName":"AWS","Verified":false,"SourceMetadata":{"Data":{"Filesystem":{"file":"secret.py","line":3}}}}'
exit 0"#;

const FAKE_SEMGREP_CLEAN: &str = r#"case "$1" in
  --version) echo "1.96.0"; exit 0;;
esac
echo '{"results":[],"errors":[]}'
exit 0"#;

const FAKE_HANG: &str = r#"case "$1" in
  --version) echo "gitleaks version 8.21.2"; exit 0;;
esac
sleep 300"#;

fn base_config(tools: &[&str], cache_dir: PathBuf) -> DragnetConfig {
    let mut config = DragnetConfig::default();
    config.profile = "standard".to_string();
    config.tools = tools.iter().map(|t| (*t).to_string()).collect();
    config.concurrency = Concurrency::Fixed(2);
    config.epss.cache_dir = Some(cache_dir);
    config
}

async fn scan(target: &Path, config: DragnetConfig) -> ScanResult {
    let mut options = ScanOptions::new(config);
    options.offline_enrichment = true;
    run_scan(
        &[Target::Repo {
            path: target.to_path_buf(),
        }],
        options,
    )
    .await
    .expect("scan runs")
}

#[tokio::test]
async fn empty_target_scan_completes_with_no_findings() {
    let bin = tempfile::tempdir().unwrap();
    install_fake_tool(bin.path(), "gitleaks", FAKE_GITLEAKS_CLEAN);
    install_fake_tool(bin.path(), "semgrep", FAKE_SEMGREP_CLEAN);
    let _path = PathOverride::prepend(bin.path());

    let target = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let result = scan(
        target.path(),
        base_config(&["gitleaks", "semgrep"], cache.path().to_path_buf()),
    )
    .await;

    assert_eq!(result.scan.outcome, ScanOutcome::Completed);
    assert!(result.findings.is_empty());
    assert_eq!(result.scan.summary.total(), 0);
    assert_eq!(result.scan.summary.at_or_above(Severity::Info), 0);
}

#[tokio::test]
async fn secret_finding_is_normalized_enriched_and_stable() {
    let bin = tempfile::tempdir().unwrap();
    install_fake_tool(bin.path(), "gitleaks", FAKE_GITLEAKS_FINDING);
    let _path = PathOverride::prepend(bin.path());

    let target = tempfile::tempdir().unwrap();
    std::fs::write(
        target.path().join("secret.py"),
        "import os\n\nAWS_SECRET = \"AKIAxxxxxxxxxxxxxxxx\"\n",
    )
    .unwrap();
    let cache = tempfile::tempdir().unwrap();

    let first = scan(
        target.path(),
        base_config(&["gitleaks"], cache.path().to_path_buf()),
    )
    .await;
    assert_eq!(first.scan.outcome, ScanOutcome::Completed);
    assert_eq!(first.findings.len(), 1);

    let finding = &first.findings[0];
    assert_eq!(finding.severity, Severity::High);
    assert_eq!(finding.location.path, "secret.py");
    assert_eq!(finding.location.start_line, Some(3));
    assert_eq!(finding.tool.version.as_deref(), Some("8.21.2"));
    assert!(finding.compliance.cwe.contains(&"CWE-798".to_string()));
    assert!(
        finding
            .compliance
            .pci_dss
            .iter()
            .any(|p| p.contains("PCI DSS")),
        "hardcoded credentials must map to PCI DSS"
    );
    assert!(finding.priority.score > 0);

    // Same scan, same defect, same id.
    let second = scan(
        target.path(),
        base_config(&["gitleaks"], cache.path().to_path_buf()),
    )
    .await;
    assert_eq!(second.findings.len(), 1);
    assert_eq!(second.findings[0].id, finding.id);
}

#[tokio::test]
async fn timeout_consumes_retry_budget_then_scan_is_partial() {
    let bin = tempfile::tempdir().unwrap();
    install_fake_tool(bin.path(), "gitleaks", FAKE_HANG);
    let _path = PathOverride::prepend(bin.path());

    let target = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let mut config = base_config(&["gitleaks"], cache.path().to_path_buf());
    config.per_tool.insert(
        "gitleaks".to_string(),
        ToolOverrides {
            flags: Vec::new(),
            timeout: Some(1),
            retries: Some(1),
            success_codes: None,
        },
    );

    let result = scan(target.path(), config).await;
    assert_eq!(result.scan.outcome, ScanOutcome::Partial);
    assert_eq!(result.scan.attempts.get("gitleaks"), Some(&2));
    assert_eq!(result.records.len(), 1);
    assert_eq!(
        result.records[0].outcome,
        dragnet_tools::RunOutcome::Timeout
    );
}

#[tokio::test]
async fn cross_tool_consensus_merges_to_one_finding() {
    let bin = tempfile::tempdir().unwrap();
    install_fake_tool(bin.path(), "gitleaks", FAKE_GITLEAKS_FINDING);
    install_fake_tool(bin.path(), "trufflehog", FAKE_TRUFFLEHOG_FINDING);
    let _path = PathOverride::prepend(bin.path());

    let target = tempfile::tempdir().unwrap();
    std::fs::write(target.path().join("secret.py"), "AWS_SECRET = \"AKIA...\"\n").unwrap();
    let cache = tempfile::tempdir().unwrap();

    let result = scan(
        target.path(),
        base_config(&["gitleaks", "trufflehog"], cache.path().to_path_buf()),
    )
    .await;

    assert_eq!(
        result.findings.len(),
        1,
        "the same secret from two tools must merge"
    );
    let finding = &result.findings[0];
    let mut tools: Vec<&str> = finding
        .detected_by
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    tools.sort_unstable();
    assert_eq!(tools, vec!["gitleaks", "trufflehog"]);
    assert_eq!(finding.severity, Severity::High);
    assert_eq!(finding.raw.len(), 2, "both raw payloads retained");
}

#[tokio::test]
async fn concurrency_level_does_not_change_the_finding_set() {
    let bin = tempfile::tempdir().unwrap();
    install_fake_tool(bin.path(), "gitleaks", FAKE_GITLEAKS_FINDING);
    install_fake_tool(bin.path(), "trufflehog", FAKE_TRUFFLEHOG_FINDING);
    install_fake_tool(bin.path(), "semgrep", FAKE_SEMGREP_CLEAN);
    let _path = PathOverride::prepend(bin.path());

    let target = tempfile::tempdir().unwrap();
    std::fs::write(target.path().join("secret.py"), "AWS_SECRET = \"AKIA...\"\n").unwrap();
    let cache = tempfile::tempdir().unwrap();
    let tools = ["gitleaks", "trufflehog", "semgrep"];

    let mut sequential_config = base_config(&tools, cache.path().to_path_buf());
    sequential_config.concurrency = Concurrency::Fixed(1);
    let sequential = scan(target.path(), sequential_config).await;

    let mut parallel_config = base_config(&tools, cache.path().to_path_buf());
    parallel_config.concurrency = Concurrency::Fixed(8);
    let parallel = scan(target.path(), parallel_config).await;

    let sequential_ids: Vec<&str> = sequential.findings.iter().map(|f| f.id.as_str()).collect();
    let parallel_ids: Vec<&str> = parallel.findings.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(sequential_ids, parallel_ids);
}

#[tokio::test]
async fn cancellation_returns_cancelled_with_partial_results() {
    let bin = tempfile::tempdir().unwrap();
    install_fake_tool(bin.path(), "gitleaks", FAKE_HANG);
    let _path = PathOverride::prepend(bin.path());

    let target = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let config = base_config(&["gitleaks"], cache.path().to_path_buf());

    let cancel = CancelHandle::new();
    let mut options = ScanOptions::new(config);
    options.cancel = cancel.clone();
    options.offline_enrichment = true;

    let target_path = target.path().to_path_buf();
    let scan_task = tokio::spawn(async move {
        run_scan(&[Target::Repo { path: target_path }], options).await
    });
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    cancel.cancel();

    let result = tokio::time::timeout(std::time::Duration::from_secs(30), scan_task)
        .await
        .expect("cancellation must not hang")
        .expect("task join")
        .expect("scan result");
    assert_eq!(result.scan.outcome, ScanOutcome::Cancelled);
}

#[tokio::test]
async fn missing_tool_produces_stub_marker_by_default() {
    let bin = tempfile::tempdir().unwrap();
    // sh must stay reachable for nothing here; the dir is simply empty.
    let _path = PathOverride::exclusive(bin.path());

    let target = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let result = scan(
        target.path(),
        base_config(&["gitleaks"], cache.path().to_path_buf()),
    )
    .await;

    assert_eq!(result.scan.outcome, ScanOutcome::Completed);
    assert_eq!(result.findings.len(), 1);
    let stub = &result.findings[0];
    assert_eq!(stub.rule_id, "dragnet-tool-missing");
    assert_eq!(stub.severity, Severity::Info);
}

#[tokio::test]
async fn missing_tool_fails_scan_when_policy_says_so() {
    let bin = tempfile::tempdir().unwrap();
    let _path = PathOverride::exclusive(bin.path());

    let target = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let mut config = base_config(&["gitleaks"], cache.path().to_path_buf());
    config.fail_on_missing_tool = true;

    let mut options = ScanOptions::new(config);
    options.offline_enrichment = true;
    let result = run_scan(
        &[Target::Repo {
            path: target.path().to_path_buf(),
        }],
        options,
    )
    .await;
    assert!(matches!(
        result,
        Err(dragnet_engine::ScanError::ToolMissing(_))
    ));
}

#[tokio::test]
async fn suppression_rule_filters_and_reports() {
    let bin = tempfile::tempdir().unwrap();
    install_fake_tool(bin.path(), "gitleaks", FAKE_GITLEAKS_FINDING);
    let _path = PathOverride::prepend(bin.path());

    let target = tempfile::tempdir().unwrap();
    std::fs::write(target.path().join("secret.py"), "AWS_SECRET = \"AKIA...\"\n").unwrap();
    let cache = tempfile::tempdir().unwrap();
    let mut config = base_config(&["gitleaks"], cache.path().to_path_buf());
    config.suppressions = vec![
        dragnet_types::SuppressionRule {
            id: "ACCEPTED".to_string(),
            tool: Some("gitleaks".to_string()),
            rule_id: None,
            path_glob: Some("secret.py".to_string()),
            severity_max: None,
            reason: "rotated, rotation ticket closed".to_string(),
            expires: None,
        },
        dragnet_types::SuppressionRule {
            id: "NEVER-MATCHES".to_string(),
            tool: Some("nuclei".to_string()),
            rule_id: None,
            path_glob: None,
            severity_max: None,
            reason: "stale".to_string(),
            expires: None,
        },
    ];

    let result = scan(target.path(), config).await;
    assert!(result.findings.is_empty());
    assert_eq!(result.suppressed.len(), 1);
    assert_eq!(result.suppressed[0].rule_id, "ACCEPTED");
    assert_eq!(result.unused_rules, vec!["NEVER-MATCHES".to_string()]);
}
