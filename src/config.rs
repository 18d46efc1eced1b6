use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::flickr::REST_ENDPOINT;
use crate::inventory::IMAGE_EXTENSIONS;

/// Largest page the photoset listing accepts.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Top-level configuration for a sync run.
///
/// Credentials usually come from the environment (see [`Config::apply_env`]);
/// the JSON file holds the tuning knobs.
///
/// # Loading
///
/// ```rust,no_run
/// use flickr_sync::config::Config;
///
/// let mut config = Config::load(Some("config.json".as_ref())).unwrap();
/// config.apply_env();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Flickr credentials and account.
    pub flickr: FlickrConfig,
    /// Paging, pacing and local inventory settings.
    pub sync: SyncConfig,
    /// Output behavior (dry run, backups, metadata tool).
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlickrConfig {
    pub api_key: String,
    pub api_secret: String,
    /// NSID of the photoset owner.
    pub user_id: String,
    /// OAuth access token. Required for private photos and keyword push-back.
    pub oauth_token: String,
    pub oauth_token_secret: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Photos requested per listing page.
    pub page_size: u32,
    /// Minimum gap between remote calls.
    pub call_delay_ms: u64,
    /// Pause after each local write.
    pub write_delay_ms: u64,
    /// Wait before retrying a failed photo detail call.
    pub retry_backoff_secs: u64,
    /// Files per metadata read.
    pub read_batch_size: usize,
    /// Image extensions to inventory (case-insensitive).
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// If `true`, log planned writes and pushes without performing them.
    pub dry_run: bool,
    /// If `true`, exiftool keeps an `_original` copy of every modified file.
    pub backup_originals: bool,
    /// Path or name of the exiftool executable.
    pub exiftool: String,
}

impl Default for FlickrConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            user_id: String::new(),
            oauth_token: String::new(),
            oauth_token_secret: String::new(),
            endpoint: REST_ENDPOINT.to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            call_delay_ms: 100,
            write_delay_ms: 50,
            retry_backoff_secs: 30,
            read_batch_size: 64,
            extensions: IMAGE_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup_originals: false,
            exiftool: "exiftool".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn call_delay(&self) -> Duration {
        Duration::from_millis(self.call_delay_ms)
    }

    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

impl Config {
    /// Resolve the config file path: same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Override credentials with values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let flickr = &mut self.flickr;
        let targets: [(&str, &mut String); 5] = [
            ("MY_FLICKR_API_KEY", &mut flickr.api_key),
            ("SECRET_KEY", &mut flickr.api_secret),
            ("USER_ID", &mut flickr.user_id),
            ("FLICKR_OAUTH_TOKEN", &mut flickr.oauth_token),
            ("FLICKR_OAUTH_TOKEN_SECRET", &mut flickr.oauth_token_secret),
        ];
        for (name, field) in targets {
            if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
                *field = value.trim().to_string();
            }
        }
    }

    /// Reject configurations that cannot make a single remote call.
    pub fn validate(&self) -> Result<()> {
        if self.flickr.api_key.is_empty() {
            anyhow::bail!("No Flickr API key configured (set MY_FLICKR_API_KEY)");
        }
        if self.flickr.user_id.is_empty() {
            anyhow::bail!("No Flickr user id configured (set USER_ID)");
        }
        if self.sync.page_size == 0 || self.sync.page_size > MAX_PAGE_SIZE {
            anyhow::bail!(
                "Page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.sync.page_size
            );
        }
        if self.sync.extensions.is_empty() {
            anyhow::bail!("No image extensions configured");
        }
        Ok(())
    }
}
