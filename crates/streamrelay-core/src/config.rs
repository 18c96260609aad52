//! Configuration resolution for the relay.
//!
//! Values are resolved once at process start, in increasing priority:
//! 1. Built-in defaults
//! 2. Optional TOML file
//! 3. Environment variables
//! 4. CLI arguments (applied by the binary)
//!
//! Resolution sits behind the [`ConfigProvider`] trait so that providers which
//! fetch or decrypt values elsewhere can be swapped in without touching the
//! relay itself.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::frame::FrameEncoding;

pub const ENV_AGENT_ID: &str = "AGENT_ID";
pub const ENV_AGENT_ALIAS_ID: &str = "AGENT_ALIAS_ID";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_DELIVERY_ENDPOINT: &str = "RELAY_DELIVERY_ENDPOINT";
pub const ENV_SENTINEL: &str = "RELAY_SENTINEL";
pub const ENV_ENCODING: &str = "RELAY_ENCODING";

const DEFAULT_REGION: &str = "ap-northeast-1";

/// Complete relay configuration. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Identifier of the managed agent to invoke.
    pub agent_id: String,
    /// Alias of the agent version to invoke.
    pub agent_alias_id: String,
    pub region: String,
    /// Fixed connection-management endpoint. When unset, the endpoint is
    /// derived per event from its `domainName` and `stage`.
    pub delivery_endpoint: Option<String>,
    /// End-of-stream marker. Defaults per encoding.
    pub sentinel: Option<String>,
    pub encoding: FrameEncoding,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            agent_alias_id: String::new(),
            region: DEFAULT_REGION.to_string(),
            delivery_endpoint: None,
            sentinel: None,
            encoding: FrameEncoding::default(),
        }
    }
}

impl RelayConfig {
    /// The sentinel actually sent to clients.
    pub fn sentinel(&self) -> &str {
        self.sentinel
            .as_deref()
            .unwrap_or_else(|| self.encoding.default_sentinel())
    }

    /// Check that everything needed to serve a request is present.
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(Error::Config(format!("agent id is not set ({ENV_AGENT_ID})")));
        }
        if self.agent_alias_id.trim().is_empty() {
            return Err(Error::Config(format!(
                "agent alias id is not set ({ENV_AGENT_ALIAS_ID})"
            )));
        }
        if self.region.trim().is_empty() {
            return Err(Error::Config("region must not be empty".into()));
        }
        if let Some(sentinel) = &self.sentinel {
            if sentinel.trim().is_empty() {
                return Err(Error::Config("sentinel must not be blank".into()));
            }
        }
        Ok(())
    }
}

/// Source of the relay configuration.
pub trait ConfigProvider: Send + Sync {
    /// Short name for logs, e.g. `"env"` or `"file"`.
    fn name(&self) -> &str;

    /// Resolve the configuration. Called once at startup.
    fn load(&self) -> Result<RelayConfig>;
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

fn process_env() -> EnvLookup {
    Box::new(|key| std::env::var(key).ok())
}

/// Defaults overlaid with environment variables.
pub struct EnvConfigProvider {
    lookup: EnvLookup,
}

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self {
            lookup: process_env(),
        }
    }

    /// Use a custom variable lookup instead of the process environment.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }
}

impl Default for EnvConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn name(&self) -> &str {
        "env"
    }

    fn load(&self) -> Result<RelayConfig> {
        let mut config = RelayConfig::default();
        apply_env_overrides(&mut config, &self.lookup)?;
        Ok(config)
    }
}

/// Defaults, then a TOML file, then environment variables.
pub struct FileConfigProvider {
    path: PathBuf,
    lookup: EnvLookup,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lookup: process_env(),
        }
    }

    /// Use a custom variable lookup instead of the process environment.
    #[must_use]
    pub fn with_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.lookup = Box::new(lookup);
        self
    }
}

impl ConfigProvider for FileConfigProvider {
    fn name(&self) -> &str {
        "file"
    }

    fn load(&self) -> Result<RelayConfig> {
        let mut config = load_config_file(&self.path)?;
        apply_env_overrides(&mut config, &self.lookup)?;
        Ok(config)
    }
}

fn load_config_file(path: &Path) -> Result<RelayConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let config = toml::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    debug!(path = %path.display(), "Loaded relay config file");
    Ok(config)
}

/// First non-empty value among `keys`.
fn lookup_any(lookup: &EnvLookup, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| lookup(key).filter(|v| !v.is_empty()))
}

fn apply_env_overrides(config: &mut RelayConfig, lookup: &EnvLookup) -> Result<()> {
    // Lower-case names are what older deployments export.
    if let Some(val) = lookup_any(lookup, &[ENV_AGENT_ID, "agent_id"]) {
        config.agent_id = val;
    }
    if let Some(val) = lookup_any(lookup, &[ENV_AGENT_ALIAS_ID, "agent_alias_id"]) {
        config.agent_alias_id = val;
    }
    if let Some(val) = lookup_any(lookup, &[ENV_REGION]) {
        config.region = val;
    }
    if let Some(val) = lookup_any(lookup, &[ENV_DELIVERY_ENDPOINT]) {
        config.delivery_endpoint = Some(val);
    }
    if let Some(val) = lookup_any(lookup, &[ENV_SENTINEL]) {
        config.sentinel = Some(val);
    }
    if let Some(val) = lookup_any(lookup, &[ENV_ENCODING]) {
        config.encoding = val.parse()?;
    }
    Ok(())
}
