//! Job expansion: targets x tools -> schedulable units.

use std::time::Duration;

use dragnet_config::{DragnetConfig, Profile};
use dragnet_tools::{RunOutcome, ToolKind};
use dragnet_types::Target;

/// One (target, tool) pair with its effective policy. The attempt counter
/// lives on the job so a retried job is the same job, one attempt later.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    pub tool: ToolKind,
    pub target: Target,
    /// 1-based; incremented on each retry.
    pub attempt: u32,
    /// Total attempts allowed: 1 + retry budget.
    pub max_attempts: u32,
    pub timeout: Duration,
    /// Extra flags from `per_tool.<name>.flags`.
    pub flags: Vec<String>,
    pub success_codes: Vec<i32>,
}

impl Job {
    #[must_use]
    pub fn retries_remaining(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// The job re-queued for its next attempt.
    #[must_use]
    pub fn next_attempt(mut self) -> Self {
        self.attempt += 1;
        self
    }
}

/// The terminal record of one job, after all its attempts.
#[derive(Debug)]
pub struct JobRecord {
    pub job: Job,
    pub outcome: RunOutcome,
    /// Attempts actually consumed.
    pub attempts: u32,
    pub duration: Duration,
    /// Raw stdout of the final attempt, for the per-tool payload files.
    pub raw_stdout: Vec<u8>,
    pub stdout_truncated: bool,
}

/// Cross targets with the requested tools, keeping compatible pairs only,
/// with per-tool timeout/retry/flag/exit-code overrides applied.
#[must_use]
pub fn expand_jobs(
    targets: &[Target],
    tools: &[ToolKind],
    config: &DragnetConfig,
    profile: &Profile,
) -> Vec<Job> {
    let mut jobs = Vec::new();
    let mut id = 0;

    for target in targets {
        for tool in tools {
            if !tool.supports(target.kind()) {
                continue;
            }
            let name = tool.name();
            let overrides = config.per_tool.get(name);
            let success_codes = overrides
                .and_then(|o| o.success_codes.clone())
                .unwrap_or_else(|| tool.success_codes().to_vec());
            jobs.push(Job {
                id,
                tool: *tool,
                target: target.clone(),
                attempt: 1,
                max_attempts: 1 + config.tool_retries(name, profile),
                timeout: Duration::from_secs(config.tool_timeout(name, profile)),
                flags: overrides.map(|o| o.flags.clone()).unwrap_or_default(),
                success_codes,
            });
            id += 1;
        }
    }
    jobs
}

#[cfg(test)]
mod tests {
    use super::expand_jobs;
    use dragnet_config::{DragnetConfig, ToolOverrides};
    use dragnet_tools::ToolKind;
    use dragnet_types::Target;

    fn config() -> DragnetConfig {
        let mut config = DragnetConfig::default();
        config.per_tool.insert(
            "semgrep".to_string(),
            ToolOverrides {
                flags: vec!["--max-target-bytes=2000000".to_string()],
                timeout: Some(900),
                retries: Some(2),
                success_codes: None,
            },
        );
        config
    }

    #[test]
    fn incompatible_pairs_are_skipped() {
        let config = config();
        let profile = config.effective_profile().unwrap();
        let targets = vec![Target::Url {
            url: "https://example.com".to_string(),
        }];
        let tools = vec![ToolKind::Gitleaks, ToolKind::Nuclei];
        let jobs = expand_jobs(&targets, &tools, &config, &profile);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].tool, ToolKind::Nuclei);
    }

    #[test]
    fn overrides_apply_per_tool() {
        let config = config();
        let profile = config.effective_profile().unwrap();
        let targets = vec![Target::Repo {
            path: "/tmp/app".into(),
        }];
        let tools = vec![ToolKind::Semgrep, ToolKind::Gitleaks];
        let jobs = expand_jobs(&targets, &tools, &config, &profile);

        let semgrep = jobs.iter().find(|j| j.tool == ToolKind::Semgrep).unwrap();
        assert_eq!(semgrep.timeout.as_secs(), 900);
        assert_eq!(semgrep.max_attempts, 3);
        assert_eq!(semgrep.flags.len(), 1);

        let gitleaks = jobs.iter().find(|j| j.tool == ToolKind::Gitleaks).unwrap();
        assert_eq!(gitleaks.timeout.as_secs(), profile.timeout_secs);
        assert_eq!(gitleaks.success_codes, vec![0, 1]);
    }

    #[test]
    fn attempt_counting() {
        let config = config();
        let profile = config.effective_profile().unwrap();
        let targets = vec![Target::Repo {
            path: "/tmp/app".into(),
        }];
        let jobs = expand_jobs(&targets, &[ToolKind::Semgrep], &config, &profile);
        let job = jobs.into_iter().next().unwrap();
        assert!(job.retries_remaining());
        let last = job.next_attempt().next_attempt();
        assert_eq!(last.attempt, 3);
        assert!(!last.retries_remaining());
    }
}
