use std::{fs, path::Path, time::Duration};

use anyhow::{anyhow, Context, Result};
use rickdex_api::{DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use rickdex_schema::CharacterId;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "config.yaml";

fn default_base_url() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_notice_ttl_secs() -> u64 {
    4
}

fn default_bus_capacity() -> usize {
    64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub start_id: CharacterId,
    /// How long a notice stays on screen before it expires.
    #[serde(default = "default_notice_ttl_secs")]
    pub notice_ttl_secs: u64,
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            start_id: CharacterId::default(),
            notice_ttl_secs: default_notice_ttl_secs(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RickdexConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Replace `${VAR}` occurrences with the environment value (empty if unset).
pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Load `<root>/config.yaml`. A missing file yields the defaults.
pub fn load_config(root: &Path) -> Result<RickdexConfig> {
    let path = root.join(CONFIG_FILE_NAME);
    let mut config = if path.exists() {
        read_yaml_file::<RickdexConfig>(&path)?
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        RickdexConfig::default()
    };

    config.api.base_url = resolve_env_var(&config.api.base_url);
    config.api.user_agent = resolve_env_var(&config.api.user_agent);

    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &RickdexConfig) -> Result<()> {
    let base = config.api.base_url.trim();
    if base.is_empty() {
        return Err(anyhow!("api.base_url must not be empty"));
    }
    if !base.starts_with("http://") && !base.starts_with("https://") {
        return Err(anyhow!("api.base_url must be an http(s) url: {base}"));
    }
    if config.api.timeout_secs == 0 {
        return Err(anyhow!("api.timeout_secs must be greater than zero"));
    }
    if config.browser.bus_capacity == 0 {
        return Err(anyhow!("browser.bus_capacity must be greater than zero"));
    }
    if config.browser.notice_ttl_secs == 0 {
        return Err(anyhow!("browser.notice_ttl_secs must be greater than zero"));
    }
    Ok(())
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}
