//! Configuration loading, parsing, and defaults for Dragnet.
//!
//! Configuration comes from a TOML file (`dragnet.toml` in the working
//! directory, falling back to the user config directory), overlaid with
//! whatever the caller overrides programmatically. Parsing is strict on
//! shape but lenient on absence: a missing file yields the defaults.

mod profile;
mod weights;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use dragnet_types::{Severity, SuppressionRule};

pub use profile::{Profile, builtin_profile, builtin_profile_names};
pub use weights::PriorityWeights;

/// File name searched for in the working directory.
pub const CONFIG_FILE_NAME: &str = "dragnet.toml";

/// Worker-pool sizing: a fixed count or the CPU heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Concurrency {
    /// `concurrency = "auto"` in TOML.
    Auto(AutoMarker),
    Fixed(usize),
}

/// Serde helper: the literal string `"auto"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoMarker {
    Auto,
}

impl Default for Concurrency {
    fn default() -> Self {
        Concurrency::Auto(AutoMarker::Auto)
    }
}

impl Concurrency {
    /// Resolve to a worker count: ~0.75 x logical CPUs, clamped to [2, 16].
    /// Fixed values are clamped to the same bounds.
    #[must_use]
    pub fn effective(self) -> usize {
        match self {
            Concurrency::Auto(_) => {
                let cpus = num_cpus::get();
                ((cpus * 3) / 4).clamp(2, 16)
            }
            Concurrency::Fixed(n) => n.clamp(1, 16),
        }
    }
}

/// Per-tool overrides: `[per_tool.<name>]` in TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOverrides {
    /// Extra command-line flags appended to the tool invocation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    /// Per-tool deadline in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Per-tool retry budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Exit codes that mean "ran fine, findings may exist".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_codes: Option<Vec<i32>>,
}

/// History store knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Database path; `None` means `<data_dir>/dragnet/history.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

/// EPSS cache knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpssConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_epss_ttl_days")]
    pub ttl_days: u64,
}

impl Default for EpssConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            ttl_days: default_epss_ttl_days(),
        }
    }
}

/// KEV catalog knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KevConfig {
    #[serde(default = "default_kev_refresh_days")]
    pub refresh_days: u64,
}

impl Default for KevConfig {
    fn default() -> Self {
        Self {
            refresh_days: default_kev_refresh_days(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_epss_ttl_days() -> u64 {
    30
}

fn default_kev_refresh_days() -> u64 {
    7
}

fn default_profile() -> String {
    "standard".to_string()
}

/// Root configuration. Every field has a working default so `dragnet scan .`
/// runs with no config file at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragnetConfig {
    /// Named bundle of tools/concurrency/timeout/retries defaults.
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Overrides the profile's tool list when non-empty.
    pub tools: Vec<String>,
    pub concurrency: Concurrency,
    /// Default per-tool deadline in seconds; `None` uses the profile's.
    pub timeout: Option<u64>,
    /// Default per-tool retry budget; `None` uses the profile's.
    pub retries: Option<u32>,
    pub per_tool: BTreeMap<String, ToolOverrides>,
    /// Target include globs (empty = include everything).
    pub include: Vec<String>,
    /// Target exclude globs.
    pub exclude: Vec<String>,
    pub suppressions: Vec<SuppressionRule>,
    /// Minimum severity that makes `dragnet ci` exit non-zero.
    pub fail_on: Option<Severity>,
    /// When true, a missing tool binary fails the scan instead of producing
    /// a stub marker.
    pub fail_on_missing_tool: bool,
    pub history: HistoryConfig,
    pub epss: EpssConfig,
    pub kev: KevConfig,
    pub priority: PriorityWeights,
}

impl Default for DragnetConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            tools: Vec::new(),
            concurrency: Concurrency::default(),
            timeout: None,
            retries: None,
            per_tool: BTreeMap::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            suppressions: Vec::new(),
            fail_on: None,
            fail_on_missing_tool: false,
            history: HistoryConfig::default(),
            epss: EpssConfig::default(),
            kev: KevConfig::default(),
            priority: PriorityWeights::default(),
        }
    }
}

impl DragnetConfig {
    /// Load from the default location, falling back to defaults when no
    /// config file exists. Parse errors are surfaced, not swallowed: a
    /// present-but-broken config should stop the run.
    pub fn load() -> Result<Self, ConfigError> {
        match find_config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DragnetConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;
        tracing::debug!(path = %path.display(), profile = %config.profile, "Loaded config");
        Ok(config)
    }

    /// The profile after applying `tools`/`timeout`/`retries` overrides.
    pub fn effective_profile(&self) -> Result<Profile, ConfigError> {
        let mut profile = builtin_profile(&self.profile)
            .ok_or_else(|| ConfigError::UnknownProfile(self.profile.clone()))?;
        if !self.tools.is_empty() {
            profile.tools = self.tools.clone();
        }
        if let Some(timeout) = self.timeout {
            profile.timeout_secs = timeout;
        }
        if let Some(retries) = self.retries {
            profile.retries = retries;
        }
        Ok(profile)
    }

    /// Effective deadline for one tool, in seconds.
    #[must_use]
    pub fn tool_timeout(&self, tool: &str, profile: &Profile) -> u64 {
        self.per_tool
            .get(tool)
            .and_then(|o| o.timeout)
            .unwrap_or(profile.timeout_secs)
    }

    /// Effective retry budget for one tool.
    #[must_use]
    pub fn tool_retries(&self, tool: &str, profile: &Profile) -> u32 {
        self.per_tool
            .get(tool)
            .and_then(|o| o.retries)
            .unwrap_or(profile.retries)
    }

    /// Default history database path under the user data directory.
    #[must_use]
    pub fn history_db_path(&self) -> PathBuf {
        if let Some(path) = &self.history.path {
            return path.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dragnet")
            .join("history.db")
    }

    /// Default enrichment cache directory under the user cache directory.
    #[must_use]
    pub fn enrichment_cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.epss.cache_dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dragnet")
    }
}

/// Locate the config file: working directory first, then the user config dir.
#[must_use]
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    let user = dirs::config_dir()?.join("dragnet").join(CONFIG_FILE_NAME);
    user.exists().then_some(user)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
    #[error("unknown profile: {0:?}")]
    UnknownProfile(String),
}

#[cfg(test)]
mod tests {
    use super::{Concurrency, DragnetConfig};
    use dragnet_types::Severity;

    #[test]
    fn defaults_without_file() {
        let config = DragnetConfig::default();
        let parsed: DragnetConfig = toml::from_str("").unwrap();
        assert_eq!(config, parsed);
        assert_eq!(parsed.profile, "standard");
        assert!(parsed.history.enabled);
        assert_eq!(parsed.epss.ttl_days, 30);
        assert_eq!(parsed.kev.refresh_days, 7);
    }

    #[test]
    fn parses_full_document() {
        let doc = r#"
            profile = "fast"
            tools = ["gitleaks", "semgrep"]
            concurrency = 4
            timeout = 300
            fail_on = "HIGH"

            [per_tool.semgrep]
            flags = ["--metrics=off"]
            timeout = 900
            success_codes = [0, 1]

            [[suppressions]]
            id = "SUP-1"
            tool = "gitleaks"
            path_glob = "tests/**"
            reason = "fixtures"
        "#;
        let config: DragnetConfig = toml::from_str(doc).unwrap();
        assert_eq!(config.profile, "fast");
        assert_eq!(config.concurrency, Concurrency::Fixed(4));
        assert_eq!(config.fail_on, Some(Severity::High));
        let semgrep = config.per_tool.get("semgrep").unwrap();
        assert_eq!(semgrep.timeout, Some(900));
        assert_eq!(semgrep.success_codes.as_deref(), Some(&[0, 1][..]));
        assert_eq!(config.suppressions.len(), 1);
        assert_eq!(config.suppressions[0].path_glob.as_deref(), Some("tests/**"));
    }

    #[test]
    fn concurrency_auto_parses_and_clamps() {
        let config: DragnetConfig = toml::from_str("concurrency = \"auto\"").unwrap();
        let n = config.concurrency.effective();
        assert!((2..=16).contains(&n));
        assert_eq!(Concurrency::Fixed(99).effective(), 16);
        assert_eq!(Concurrency::Fixed(1).effective(), 1);
    }

    #[test]
    fn per_tool_overrides_win_over_profile() {
        let doc = r#"
            profile = "standard"
            [per_tool.trivy]
            timeout = 1200
            retries = 3
        "#;
        let config: DragnetConfig = toml::from_str(doc).unwrap();
        let profile = config.effective_profile().unwrap();
        assert_eq!(config.tool_timeout("trivy", &profile), 1200);
        assert_eq!(config.tool_retries("trivy", &profile), 3);
        assert_eq!(config.tool_timeout("grype", &profile), profile.timeout_secs);
    }

    #[test]
    fn broken_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dragnet.toml");
        std::fs::write(&path, "profile = [nonsense").unwrap();
        assert!(DragnetConfig::load_from(&path).is_err());
    }
}
