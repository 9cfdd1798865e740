//! Configuration file handling.
//!
//! This module handles loading `.autorf.toml` and merging it with
//! command-line arguments and environment secrets.

use crate::cli::MAX_RANGE_DAYS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".autorf.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// GitHub statistics API settings.
    #[serde(default)]
    pub github: GithubConfig,

    /// Row store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Split relay settings.
    #[serde(default)]
    pub splits: SplitsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Days of activity considered when no range is given.
    #[serde(default = "default_window_days")]
    pub window_days: i64,

    /// Lock file held while splits are being reconciled.
    #[serde(default = "default_lock_file")]
    pub lock_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            window_days: default_window_days(),
            lock_file: default_lock_file(),
        }
    }
}

fn default_window_days() -> i64 {
    7
}

fn default_lock_file() -> String {
    ".autorf.lock".to_string()
}

/// GitHub API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// REST API base URL.
    #[serde(default = "default_github_url")]
    pub api_url: String,

    /// Access token. Usually supplied through `GITHUB_TOKEN`.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// Page size for list endpoints (GitHub caps this at 100).
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Retries per project before its metrics degrade to zero.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Fixed delay between retries, in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_url(),
            token: None,
            per_page: default_per_page(),
            retries: default_retries(),
            retry_delay_seconds: default_retry_delay(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_github_url() -> String {
    "https://api.github.com".to_string()
}

fn default_per_page() -> u32 {
    100
}

fn default_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    10
}

fn default_timeout() -> u64 {
    30
}

/// Row store (PostgREST) settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL, e.g. `https://<project>.supabase.co`.
    #[serde(default)]
    pub url: String,

    /// Service key. Usually supplied through `SUPABASE_KEY`.
    #[serde(default, skip_serializing)]
    pub key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

/// Split relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitsConfig {
    /// Relay base URL.
    #[serde(default)]
    pub relay_url: String,

    /// Relay API key. Usually supplied through `SPLITS_API_KEY`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Chain the splits live on (Sepolia by default).
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Owner and creator of new splits.
    #[serde(default)]
    pub owner_address: Option<String>,

    /// Request timeout in seconds. Chain submission can be slow.
    #[serde(default = "default_splits_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SplitsConfig {
    fn default() -> Self {
        Self {
            relay_url: String::new(),
            api_key: None,
            chain_id: default_chain_id(),
            owner_address: None,
            timeout_seconds: default_splits_timeout(),
        }
    }
}

fn default_chain_id() -> u64 {
    11_155_111
}

fn default_splits_timeout() -> u64 {
    120
}

impl GithubConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Values given on the command line or through the environment take
    /// precedence over the config file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref token) = args.github_token {
            self.github.token = Some(token.clone());
        }
        if let Some(ref url) = args.store_url {
            self.store.url = url.clone();
        }
        if let Some(ref key) = args.store_key {
            self.store.key = Some(key.clone());
        }
        if let Some(ref url) = args.splits_url {
            self.splits.relay_url = url.clone();
        }
        if let Some(ref key) = args.splits_api_key {
            self.splits.api_key = Some(key.clone());
        }
        if let Some(ref address) = args.operator_address {
            self.splits.owner_address = Some(address.clone());
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check the settings every command talking to the row store needs.
    pub fn require_store(&self) -> Result<()> {
        if !self.store.url.starts_with("http://") && !self.store.url.starts_with("https://") {
            anyhow::bail!("Row store URL must start with 'http://' or 'https://' (set SUPABASE_URL)");
        }
        if self.store.key.as_deref().unwrap_or("").is_empty() {
            anyhow::bail!("Row store key is missing (set SUPABASE_KEY)");
        }
        Ok(())
    }

    /// Check the settings needed to collect GitHub metrics.
    pub fn require_github(&self) -> Result<()> {
        if self.github.token.as_deref().unwrap_or("").is_empty() {
            anyhow::bail!("GitHub token is missing (set GITHUB_TOKEN)");
        }
        if self.github.per_page == 0 || self.github.per_page > 100 {
            anyhow::bail!("github.per_page must be between 1 and 100");
        }
        Ok(())
    }

    /// Check the settings needed to create or update splits.
    pub fn require_splits(&self) -> Result<()> {
        if !self.splits.relay_url.starts_with("http://")
            && !self.splits.relay_url.starts_with("https://")
        {
            anyhow::bail!("Split relay URL must start with 'http://' or 'https://' (set SPLITS_RELAY_URL)");
        }
        self.require_operator()?;
        Ok(())
    }

    /// Check that the default window is one the statistics API can serve.
    pub fn require_window(&self) -> Result<()> {
        let days = self.general.window_days;
        if !(1..=MAX_RANGE_DAYS).contains(&days) {
            anyhow::bail!(
                "general.window_days must be between 1 and {} (got {})",
                MAX_RANGE_DAYS,
                days
            );
        }
        Ok(())
    }

    /// Check that a valid operator wallet is configured.
    pub fn require_operator(&self) -> Result<&str> {
        match self.splits.owner_address.as_deref() {
            Some(address) if crate::models::is_valid_address(address) => Ok(address),
            Some(address) => anyhow::bail!("Operator address is not a valid address: {}", address),
            None => anyhow::bail!("Operator address is missing (set OPERATOR_ADDRESS)"),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Args, Command};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.github.retries, 5);
        assert_eq!(config.github.retry_delay(), Duration::from_secs(10));
        assert_eq!(config.general.window_days, 7);
        assert_eq!(config.splits.chain_id, 11_155_111);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
window_days = 14

[github]
retries = 2
retry_delay_seconds = 1

[store]
url = "https://example.supabase.co"

[splits]
relay_url = "http://localhost:8787"
owner_address = "0xde709f2102306220921060314715629080e2fb77"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.window_days, 14);
        assert_eq!(config.github.retries, 2);
        assert_eq!(config.github.per_page, 100);
        assert_eq!(config.store.url, "https://example.supabase.co");
        assert!(config.require_operator().is_ok());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[github]"));
        assert!(toml_str.contains("[splits]"));
        assert!(!toml_str.contains("token"));
    }

    #[test]
    fn test_merge_prefers_args() {
        let mut config = Config::default();
        config.store.url = "https://file.example".to_string();

        let args = Args {
            command: Command::InitConfig,
            config: None,
            verbose: true,
            quiet: false,
            github_token: Some("ghp_test".to_string()),
            store_url: Some("https://env.example".to_string()),
            store_key: Some("key".to_string()),
            splits_url: None,
            splits_api_key: None,
            operator_address: None,
        };
        config.merge_with_args(&args);

        assert_eq!(config.store.url, "https://env.example");
        assert_eq!(config.github.token.as_deref(), Some("ghp_test"));
        assert!(config.general.verbose);
        assert!(config.require_store().is_ok());
        assert!(config.require_github().is_ok());
    }

    #[test]
    fn test_requirements_report_missing_settings() {
        let config = Config::default();
        assert!(config.require_store().is_err());
        assert!(config.require_github().is_err());
        assert!(config.require_splits().is_err());
    }

    #[test]
    fn test_splits_requirement_passes_with_relay_and_operator() {
        let mut config = Config::default();
        config.splits.relay_url = "http://localhost:8787".to_string();
        config.splits.owner_address = Some("0xde709f2102306220921060314715629080e2fb77".to_string());
        assert!(config.require_splits().is_ok());

        config.splits.owner_address = Some("0x12".to_string());
        assert!(config.require_splits().is_err());
    }

    #[test]
    fn test_window_days_bounds() {
        let mut config = Config::default();
        assert!(config.require_window().is_ok());

        for days in [0, -3, 61, 365] {
            config.general.window_days = days;
            assert!(config.require_window().is_err(), "{} days accepted", days);
        }

        config.general.window_days = 60;
        assert!(config.require_window().is_ok());
    }
}
