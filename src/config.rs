//! Resolver configuration loaded from `~/.config/hosterkit/config.toml`.
//!
//! Every section has defaults, so a missing or empty file is valid. The
//! core never reads this file itself: callers load it once and pass the
//! [`UserPreference`] into [`Classifier`](crate::classify::Classifier) and
//! [`rank`](crate::rank::rank) explicitly.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::classify::{HosterIdentity, DEFAULT_INTERNAL_HOSTERS};
use crate::deobfuscate::SchemeConfig;

/// Which hosters are allowed through classification.
///
/// Sites disagree on whether their setting is an allow-list or a
/// deny-list, so the mode is explicit. In TOML this is a table with a
/// `mode` and an optional `hosters` list that defaults to empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PolicyTable", into = "PolicyTable")]
pub enum HosterPolicy {
    /// Everything except the listed identities.
    DenyList(BTreeSet<HosterIdentity>),
    /// Only the listed identities.
    AllowList(BTreeSet<HosterIdentity>),
}

impl HosterPolicy {
    pub fn permits(&self, identity: &HosterIdentity) -> bool {
        match self {
            Self::DenyList(denied) => !denied.contains(identity),
            Self::AllowList(allowed) => allowed.contains(identity),
        }
    }
}

impl Default for HosterPolicy {
    fn default() -> Self {
        Self::DenyList(BTreeSet::new())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum PolicyMode {
    DenyList,
    AllowList,
}

#[derive(Serialize, Deserialize)]
struct PolicyTable {
    mode: PolicyMode,
    #[serde(default)]
    hosters: BTreeSet<HosterIdentity>,
}

impl From<PolicyTable> for HosterPolicy {
    fn from(table: PolicyTable) -> Self {
        match table.mode {
            PolicyMode::DenyList => Self::DenyList(table.hosters),
            PolicyMode::AllowList => Self::AllowList(table.hosters),
        }
    }
}

impl From<HosterPolicy> for PolicyTable {
    fn from(policy: HosterPolicy) -> Self {
        match policy {
            HosterPolicy::DenyList(hosters) => Self {
                mode: PolicyMode::DenyList,
                hosters,
            },
            HosterPolicy::AllowList(hosters) => Self {
                mode: PolicyMode::AllowList,
                hosters,
            },
        }
    }
}

/// Per-request preference snapshot. Read-only inside the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreference {
    /// Hoster to float to the top. `None` falls back to source priority.
    pub preferred_hoster_name: Option<String>,
    pub preferred_quality_token: String,
    pub preferred_subtitle_language: String,
    pub hosters: HosterPolicy,
    /// Name candidates after their URL's domain instead of the site label.
    pub label_from_host: bool,
}

impl Default for UserPreference {
    fn default() -> Self {
        Self {
            preferred_hoster_name: None,
            preferred_quality_token: "1080p".to_string(),
            preferred_subtitle_language: "English".to_string(),
            hosters: HosterPolicy::default(),
            label_from_host: false,
        }
    }
}

/// HTTP client settings. Timeouts are per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Cap on simultaneously running extractions. `None` is unbounded.
    pub max_concurrency: Option<usize>,
}

/// The site's own streaming API used by internal servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalConfig {
    /// Base URL that decoded internal paths are joined onto.
    pub api_base: String,
    /// Sent as `Origin`/`Referer` on API calls and direct player links.
    pub site_url: Option<String>,
    /// Lowercase internal server names, matched against labels.
    pub hoster_names: Vec<String>,
    /// Append a VRF-signed `vrf=` parameter to API calls.
    pub sign_requests: bool,
    /// Drop links whose resolution mentions `raw`.
    pub skip_raw: bool,
}

impl Default for InternalConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            site_url: None,
            hoster_names: DEFAULT_INTERNAL_HOSTERS.iter().map(|s| (*s).to_string()).collect(),
            sign_requests: false,
            skip_raw: true,
        }
    }
}

/// Everything a [`Resolver`](crate::pipeline::Resolver) needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub preferences: UserPreference,
    pub http: HttpConfig,
    pub dispatch: DispatchConfig,
    pub internal: InternalConfig,
    pub schemes: SchemeConfig,
}

impl ResolverConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid resolver config")
    }
}

/// Load the resolver config from `~/.config/hosterkit/config.toml`.
///
/// Returns defaults if the file doesn't exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<ResolverConfig> {
    let path = config_path();
    if !path.exists() {
        return Ok(ResolverConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
}

/// Return the path to the config file.
fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hosterkit")
        .join("config.toml")
}
