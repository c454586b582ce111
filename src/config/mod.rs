use crate::global;
use crate::validation::ValidationRules;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

pub const ENV_API_URL: &str = "PODSUM_API_URL";
pub const ENV_API_ENDPOINT: &str = "PODSUM_API_ENDPOINT";
pub const ENV_POLL_INTERVAL_MS: &str = "PODSUM_POLL_INTERVAL_MS";
pub const ENV_MAX_UPLOAD_BYTES: &str = "PODSUM_MAX_UPLOAD_BYTES";
pub const ENV_ACCEPTED_CONTENT_TYPES: &str = "PODSUM_ACCEPTED_CONTENT_TYPES";
pub const ENV_ACCEPTED_EXTENSIONS: &str = "PODSUM_ACCEPTED_EXTENSIONS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub validation: ValidationRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub process_audio_path: String,
    /// Delay between two status queries of an asynchronous job.
    pub poll_interval_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54239".to_string(),
            process_audio_path: "/api/process-audio".to_string(),
            poll_interval_ms: 2000,
        }
    }
}

impl ApiConfig {
    /// Full URL of the submission endpoint.
    pub fn process_audio_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.process_audio_path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Load the config file (creating it with defaults when missing), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            config
        } else {
            let content =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            let config = Self::from_toml(&content)?;
            info!("Loaded config from {:?}", config_path);
            config
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.check()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        global::config_file()
    }

    /// Apply `PODSUM_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = value(ENV_API_URL) {
            debug!("{} overrides api.base_url", ENV_API_URL);
            self.api.base_url = url.trim().to_string();
        }
        if let Some(path) = value(ENV_API_ENDPOINT) {
            debug!("{} overrides api.process_audio_path", ENV_API_ENDPOINT);
            self.api.process_audio_path = path.trim().to_string();
        }
        if let Some(raw) = value(ENV_POLL_INTERVAL_MS) {
            self.api.poll_interval_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_POLL_INTERVAL_MS} must be a number, got {raw:?}"))?;
        }
        if let Some(raw) = value(ENV_MAX_UPLOAD_BYTES) {
            self.validation.max_size_bytes = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_MAX_UPLOAD_BYTES} must be a number, got {raw:?}"))?;
        }
        if let Some(raw) = value(ENV_ACCEPTED_CONTENT_TYPES) {
            self.validation.accepted_content_types = split_list(&raw);
        }
        if let Some(raw) = value(ENV_ACCEPTED_EXTENSIONS) {
            self.validation.accepted_extensions = split_list(&raw);
        }

        Ok(())
    }

    /// Reject values the client cannot run with.
    pub fn check(&self) -> Result<()> {
        if self.api.poll_interval_ms == 0 {
            bail!("api.poll_interval_ms must be greater than zero");
        }
        if self.api.base_url.trim().is_empty() {
            bail!("api.base_url must not be empty");
        }
        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
