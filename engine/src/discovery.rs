//! Target discovery and validation.
//!
//! Expands target specs into concrete targets: a directory that is not
//! itself a repository expands to its immediate sub-repositories, a URL
//! list file expands to one URL target per line. Validation problems are
//! warnings and skip the target; they never fail the scan.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use url::Url;

use dragnet_types::Target;

/// Result of discovery: the concrete target list plus validation warnings.
#[derive(Debug, Default)]
pub struct DiscoveredTargets {
    pub targets: Vec<Target>,
    pub warnings: Vec<String>,
}

/// Expand and validate target specs, applying include/exclude globs over
/// target identifiers.
#[must_use]
pub fn discover(specs: &[Target], include: &[String], exclude: &[String]) -> DiscoveredTargets {
    let mut out = DiscoveredTargets::default();
    let include = build_globset(include, &mut out.warnings);
    let exclude = build_globset(exclude, &mut out.warnings);

    for spec in specs {
        for target in expand_one(spec, &mut out.warnings) {
            let id = target.identifier();
            if let Some(include) = &include
                && !include.is_match(&id)
            {
                continue;
            }
            if let Some(exclude) = &exclude
                && exclude.is_match(&id)
            {
                continue;
            }
            out.targets.push(target);
        }
    }
    out
}

fn expand_one(spec: &Target, warnings: &mut Vec<String>) -> Vec<Target> {
    match spec {
        Target::Repo { path } => expand_repo(path, warnings),
        Target::Iac { path } => {
            if path.exists() {
                vec![spec.clone()]
            } else {
                warnings.push(format!("iac target does not exist: {}", path.display()));
                Vec::new()
            }
        }
        Target::Url { url } => match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => vec![spec.clone()],
            Ok(parsed) => {
                warnings.push(format!("unsupported url scheme {:?}: {url}", parsed.scheme()));
                Vec::new()
            }
            Err(e) => {
                warnings.push(format!("invalid url {url}: {e}"));
                Vec::new()
            }
        },
        Target::Image { reference } | Target::RemoteRepo { reference, .. } => {
            if reference.trim().is_empty() {
                warnings.push("empty target reference".to_string());
                Vec::new()
            } else {
                vec![spec.clone()]
            }
        }
        Target::Kubernetes { context, .. } => {
            // Context existence is checked by the tool itself; an unknown
            // context surfaces as a tool failure, flagged here only when
            // obviously malformed.
            if context.trim().is_empty() {
                warnings.push("empty kubernetes context".to_string());
                Vec::new()
            } else {
                vec![spec.clone()]
            }
        }
    }
}

/// A repository path expands to itself when it looks like a repo (or is a
/// plain directory with no sub-repositories), otherwise to its immediate
/// child repositories.
fn expand_repo(path: &Path, warnings: &mut Vec<String>) -> Vec<Target> {
    if !path.exists() {
        warnings.push(format!("repo target does not exist: {}", path.display()));
        return Vec::new();
    }
    if !path.is_dir() {
        warnings.push(format!("repo target is not a directory: {}", path.display()));
        return Vec::new();
    }
    if path.join(".git").exists() {
        return vec![Target::Repo {
            path: path.to_path_buf(),
        }];
    }

    // The walk honors ignore files and skips hidden entries, so vendored or
    // ignored checkouts under the parent never become scan targets.
    let mut children = Vec::new();
    for entry in WalkBuilder::new(path).max_depth(Some(1)).build().flatten() {
        if entry.depth() == 0 {
            continue;
        }
        let child = entry.path();
        if entry.file_type().is_some_and(|t| t.is_dir()) && child.join(".git").exists() {
            children.push(Target::Repo {
                path: child.to_path_buf(),
            });
        }
    }
    children.sort_by_key(Target::identifier);

    if children.is_empty() {
        // A bare source directory is still scannable.
        vec![Target::Repo {
            path: path.to_path_buf(),
        }]
    } else {
        children
    }
}

/// Read a file of URLs, one per line, `#` comments and blanks skipped.
pub fn expand_url_file(path: &Path) -> std::io::Result<Vec<Target>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| Target::Url {
            url: line.to_string(),
        })
        .collect())
}

fn build_globset(patterns: &[String], warnings: &mut Vec<String>) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warnings.push(format!("invalid target filter glob {pattern:?}: {e}")),
        }
    }
    builder.build().ok()
}
