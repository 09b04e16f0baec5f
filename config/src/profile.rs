//! Built-in scan profiles.
//!
//! A profile is a named bundle of {tools, concurrency, timeout, retries}
//! defaults. The config file may override any part of it.

use serde::{Deserialize, Serialize};

/// Resolved profile defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub tools: Vec<String>,
    pub timeout_secs: u64,
    pub retries: u32,
}

fn tools(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

/// Look up a built-in profile by name.
#[must_use]
pub fn builtin_profile(name: &str) -> Option<Profile> {
    let profile = match name {
        // Quick pre-commit sweep: secrets and SAST only, tight deadlines.
        "fast" => Profile {
            name: "fast".to_string(),
            tools: tools(&["gitleaks", "semgrep"]),
            timeout_secs: 120,
            retries: 0,
        },
        // The default: secrets, SAST, dependency and IaC coverage.
        "standard" => Profile {
            name: "standard".to_string(),
            tools: tools(&[
                "gitleaks",
                "trufflehog",
                "semgrep",
                "bandit",
                "trivy",
                "grype",
                "checkov",
                "hadolint",
            ]),
            timeout_secs: 600,
            retries: 1,
        },
        // Everything, including SBOM generation and DAST probes.
        "deep" => Profile {
            name: "deep".to_string(),
            tools: tools(&[
                "gitleaks",
                "trufflehog",
                "semgrep",
                "bandit",
                "trivy",
                "grype",
                "syft",
                "checkov",
                "hadolint",
                "nuclei",
                "kube-bench",
            ]),
            timeout_secs: 1800,
            retries: 2,
        },
        _ => return None,
    };
    Some(profile)
}

/// Names accepted by [`builtin_profile`].
#[must_use]
pub fn builtin_profile_names() -> &'static [&'static str] {
    &["fast", "standard", "deep"]
}

#[cfg(test)]
mod tests {
    use super::{builtin_profile, builtin_profile_names};

    #[test]
    fn all_builtin_names_resolve() {
        for name in builtin_profile_names() {
            let profile = builtin_profile(name).expect("builtin profile");
            assert_eq!(profile.name.as_str(), *name);
            assert!(!profile.tools.is_empty());
            assert!(profile.timeout_secs > 0);
        }
    }

    #[test]
    fn unknown_profile_is_none() {
        assert!(builtin_profile("warp-speed").is_none());
    }

    #[test]
    fn fast_is_a_subset_of_deep() {
        let fast = builtin_profile("fast").unwrap();
        let deep = builtin_profile("deep").unwrap();
        for tool in &fast.tools {
            assert!(deep.tools.contains(tool), "{tool} missing from deep");
        }
    }
}
