//! Scan targets.
//!
//! A target is the thing a tool runs against. Target validation problems are
//! warnings, not errors - an unreachable URL or unknown cluster context skips
//! the target rather than failing the scan.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The closed set of target categories. Drives the tool compatibility matrix
/// and the on-disk `individual-<kind>/` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    Repo,
    Image,
    Iac,
    Url,
    RemoteRepo,
    Kubernetes,
}

impl TargetKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Repo => "repo",
            TargetKind::Image => "image",
            TargetKind::Iac => "iac",
            TargetKind::Url => "url",
            TargetKind::RemoteRepo => "remote-repo",
            TargetKind::Kubernetes => "kubernetes",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete scan target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Target {
    /// A local repository or source directory.
    Repo { path: PathBuf },
    /// A container image reference (`registry/name:tag`).
    Image { reference: String },
    /// A standalone IaC file or directory (Terraform, Dockerfile, manifests).
    Iac { path: PathBuf },
    /// A live endpoint probed by DAST tools.
    Url { url: String },
    /// A hosted repository scanned via the forge's API; the credential is an
    /// environment variable name, never the secret itself.
    RemoteRepo {
        reference: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credential_env: Option<String>,
    },
    /// A Kubernetes context, optionally pinned to one namespace.
    Kubernetes {
        context: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
    },
}

impl Target {
    #[must_use]
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Repo { .. } => TargetKind::Repo,
            Target::Image { .. } => TargetKind::Image,
            Target::Iac { .. } => TargetKind::Iac,
            Target::Url { .. } => TargetKind::Url,
            Target::RemoteRepo { .. } => TargetKind::RemoteRepo,
            Target::Kubernetes { .. } => TargetKind::Kubernetes,
        }
    }

    /// The identifier used as `location.path` for findings on non-file
    /// targets, and as the display name everywhere.
    #[must_use]
    pub fn identifier(&self) -> String {
        match self {
            Target::Repo { path } | Target::Iac { path } => path.display().to_string(),
            Target::Image { reference } | Target::RemoteRepo { reference, .. } => {
                reference.clone()
            }
            Target::Url { url } => url.clone(),
            Target::Kubernetes { context, namespace } => match namespace {
                Some(ns) => format!("{context}/{ns}"),
                None => context.clone(),
            },
        }
    }

    /// Root directory findings paths are made relative to, when the target
    /// is file-based.
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        match self {
            Target::Repo { path } | Target::Iac { path } => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.identifier())
    }
}
