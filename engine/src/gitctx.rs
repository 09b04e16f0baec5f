//! Git context capture.
//!
//! Best-effort snapshot of the primary repository target's git state at scan
//! start. Any git failure (not a repo, git missing) yields `None`; a scan
//! never depends on version control being present.

use std::path::Path;

use tokio::process::Command;

use dragnet_types::GitContext;

async fn git_output(repo: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Capture commit, branch, tag, and dirty state for `repo`.
pub async fn capture(repo: &Path) -> Option<GitContext> {
    let commit = git_output(repo, &["rev-parse", "HEAD"]).await?;
    let branch = git_output(repo, &["rev-parse", "--abbrev-ref", "HEAD"])
        .await
        .filter(|b| b != "HEAD");
    let tag = git_output(repo, &["describe", "--tags", "--exact-match"]).await;
    let dirty = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["diff", "--quiet", "HEAD"])
        .status()
        .await
        .map(|status| !status.success())
        .unwrap_or(false);

    Some(GitContext {
        commit: Some(commit),
        branch,
        tag,
        dirty,
    })
}

#[cfg(test)]
mod tests {
    use super::capture;

    #[tokio::test]
    async fn non_repo_directory_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(capture(dir.path()).await.is_none());
    }
}
