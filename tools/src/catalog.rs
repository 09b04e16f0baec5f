//! The closed set of supported scanners.
//!
//! Each tool's command line, exit-code semantics, and target compatibility
//! are part of its adapter contract and are version-pinned here: the pinned
//! version is the one the adapter's severity table was written against.
//! Adding a tool means adding a variant here plus an adapter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use dragnet_types::{Target, TargetKind};

/// Supported scanners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    Gitleaks,
    Trufflehog,
    Semgrep,
    Bandit,
    Trivy,
    Grype,
    Syft,
    Checkov,
    Hadolint,
    Nuclei,
    KubeBench,
}

impl ToolKind {
    pub const ALL: [ToolKind; 11] = [
        ToolKind::Gitleaks,
        ToolKind::Trufflehog,
        ToolKind::Semgrep,
        ToolKind::Bandit,
        ToolKind::Trivy,
        ToolKind::Grype,
        ToolKind::Syft,
        ToolKind::Checkov,
        ToolKind::Hadolint,
        ToolKind::Nuclei,
        ToolKind::KubeBench,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Gitleaks => "gitleaks",
            ToolKind::Trufflehog => "trufflehog",
            ToolKind::Semgrep => "semgrep",
            ToolKind::Bandit => "bandit",
            ToolKind::Trivy => "trivy",
            ToolKind::Grype => "grype",
            ToolKind::Syft => "syft",
            ToolKind::Checkov => "checkov",
            ToolKind::Hadolint => "hadolint",
            ToolKind::Nuclei => "nuclei",
            ToolKind::KubeBench => "kube-bench",
        }
    }

    /// Binary name looked up on PATH. Matches `name()` for every current
    /// tool but is a separate accessor so the two can diverge.
    #[must_use]
    pub fn binary(self) -> &'static str {
        self.name()
    }

    /// Tool version the adapter's severity table was written against.
    #[must_use]
    pub fn pinned_version(self) -> &'static str {
        match self {
            ToolKind::Gitleaks => "8.21",
            ToolKind::Trufflehog => "3.82",
            ToolKind::Semgrep => "1.96",
            ToolKind::Bandit => "1.7",
            ToolKind::Trivy => "0.58",
            ToolKind::Grype => "0.85",
            ToolKind::Syft => "1.18",
            ToolKind::Checkov => "3.2",
            ToolKind::Hadolint => "2.12",
            ToolKind::Nuclei => "3.3",
            ToolKind::KubeBench => "0.9",
        }
    }

    /// Exit codes that mean the tool ran fine. Several scanners use a
    /// non-zero code for "findings were produced, not an error".
    #[must_use]
    pub fn success_codes(self) -> &'static [i32] {
        match self {
            ToolKind::Gitleaks => &[0, 1],
            ToolKind::Trufflehog => &[0, 183],
            ToolKind::Semgrep => &[0, 1],
            ToolKind::Bandit => &[0, 1],
            ToolKind::Trivy => &[0],
            ToolKind::Grype => &[0, 1],
            ToolKind::Syft => &[0],
            ToolKind::Checkov => &[0, 1],
            ToolKind::Hadolint => &[0, 1],
            ToolKind::Nuclei => &[0, 1],
            ToolKind::KubeBench => &[0],
        }
    }

    /// Target kinds this tool can scan.
    #[must_use]
    pub fn compatible_kinds(self) -> &'static [TargetKind] {
        match self {
            ToolKind::Gitleaks | ToolKind::Trufflehog => {
                &[TargetKind::Repo, TargetKind::RemoteRepo]
            }
            ToolKind::Semgrep | ToolKind::Bandit => &[TargetKind::Repo],
            ToolKind::Trivy => &[TargetKind::Repo, TargetKind::Image, TargetKind::Iac],
            ToolKind::Grype | ToolKind::Syft => &[TargetKind::Repo, TargetKind::Image],
            ToolKind::Checkov | ToolKind::Hadolint => &[TargetKind::Repo, TargetKind::Iac],
            ToolKind::Nuclei => &[TargetKind::Url],
            ToolKind::KubeBench => &[TargetKind::Kubernetes],
        }
    }

    #[must_use]
    pub fn supports(self, kind: TargetKind) -> bool {
        self.compatible_kinds().contains(&kind)
    }

    /// Arguments for a version probe (`<binary> <args>` prints a version).
    #[must_use]
    pub fn version_args(self) -> &'static [&'static str] {
        match self {
            ToolKind::Gitleaks | ToolKind::Semgrep | ToolKind::Trufflehog => &["--version"],
            ToolKind::Bandit | ToolKind::Checkov | ToolKind::Nuclei => &["--version"],
            ToolKind::Trivy | ToolKind::Grype | ToolKind::Syft | ToolKind::KubeBench => {
                &["version"]
            }
            ToolKind::Hadolint => &["--version"],
        }
    }

    /// Build the argument vector for scanning `target`. The caller appends
    /// any per-tool flag overrides from config after these.
    ///
    /// Every invocation directs machine-readable output to stdout; the
    /// runner captures it and hands the bytes to the adapter.
    #[must_use]
    pub fn scan_args(self, target: &Target) -> Vec<String> {
        let id = target.identifier();
        let args: Vec<&str> = match (self, target) {
            (ToolKind::Gitleaks, _) => vec![
                "detect",
                "--source",
                id.as_str(),
                "--no-banner",
                "--report-format",
                "json",
                "--report-path",
                "/dev/stdout",
                "--exit-code",
                "1",
            ],
            (ToolKind::Trufflehog, Target::RemoteRepo { reference, .. }) => {
                vec!["git", reference.as_str(), "--json", "--no-update"]
            }
            (ToolKind::Trufflehog, _) => {
                vec!["filesystem", id.as_str(), "--json", "--no-update"]
            }
            (ToolKind::Semgrep, _) => vec![
                "scan",
                "--config",
                "auto",
                "--json",
                "--metrics=off",
                "--quiet",
                id.as_str(),
            ],
            (ToolKind::Bandit, _) => vec!["-r", id.as_str(), "-f", "json", "-q"],
            (ToolKind::Trivy, Target::Image { reference }) => {
                vec!["image", "--format", "json", "--quiet", reference.as_str()]
            }
            (ToolKind::Trivy, Target::Iac { .. }) => {
                vec!["config", "--format", "json", "--quiet", id.as_str()]
            }
            (ToolKind::Trivy, _) => vec!["fs", "--format", "json", "--quiet", id.as_str()],
            (ToolKind::Grype, Target::Image { reference }) => {
                vec![reference.as_str(), "-o", "json", "--quiet"]
            }
            (ToolKind::Grype, _) => vec!["dir:", "-o", "json", "--quiet"],
            (ToolKind::Syft, Target::Image { reference }) => {
                vec![reference.as_str(), "-o", "json", "--quiet"]
            }
            (ToolKind::Syft, _) => vec!["dir:", "-o", "json", "--quiet"],
            (ToolKind::Checkov, _) => {
                vec!["--directory", id.as_str(), "--output", "json", "--quiet"]
            }
            (ToolKind::Hadolint, _) => vec!["--format", "json", "--no-fail", id.as_str()],
            (ToolKind::Nuclei, _) => vec!["-u", id.as_str(), "-jsonl", "-silent", "-no-color"],
            (ToolKind::KubeBench, _) => vec!["run", "--json"],
        };

        let mut out: Vec<String> = args.into_iter().map(str::to_string).collect();
        // grype/syft address directories through a `dir:` scheme prefix.
        if matches!(self, ToolKind::Grype | ToolKind::Syft)
            && let Some(first) = out.first_mut()
            && first == "dir:"
        {
            *first = format!("dir:{id}");
        }
        out
    }

    /// Environment overrides required by the tool for this target (e.g. the
    /// kube context for cluster audits). Secrets stay in the environment;
    /// only variable names are handled here.
    #[must_use]
    pub fn env_overrides(self, target: &Target) -> Vec<(String, String)> {
        match (self, target) {
            (ToolKind::KubeBench, Target::Kubernetes { context, .. }) => {
                vec![("KUBE_CONTEXT".to_string(), context.clone())]
            }
            (ToolKind::Nuclei, _) => vec![("NO_COLOR".to_string(), "1".to_string())],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown tool: {0:?}")]
pub struct UnknownTool(pub String);

impl FromStr for ToolKind {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::ALL
            .iter()
            .find(|t| t.name() == s)
            .copied()
            .ok_or_else(|| UnknownTool(s.to_string()))
    }
}

/// Pull a dotted version token out of a tool's version-probe output.
/// Handles `gitleaks version 8.21.0`, `Version: 0.58.1`, bare `1.96.0`.
#[must_use]
pub fn extract_version(output: &str) -> Option<String> {
    let re = regex::Regex::new(r"\b(\d+\.\d+(?:\.\d+)?)\b").ok()?;
    re.captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
