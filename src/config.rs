use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::{
    CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH, DEFAULT_OUTPUT_DIR, DEFAULT_TIMEOUT_SECONDS, DEFAULT_USER_AGENT,
    USER_AGENT_ENV_VAR,
};
use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub browser: BrowserConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Chrome/Chromium executable; autodetected when unset.
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub scroll_pause_ms: u64,
    pub max_scroll_rounds: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            scroll_pause_ms: 1500,
            max_scroll_rounds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl AppConfig {
    /// Load `hs_scraper.toml` (or the file named by `HS_SCRAPER_CONFIG`),
    /// falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        let path = env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config file at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ExtractError::Config(format!("Failed to read config file '{}': {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        if config.http.timeout_seconds == 0 {
            return Err(ExtractError::Config("http.timeout_seconds must be greater than zero".into()));
        }
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(agent) = env::var(USER_AGENT_ENV_VAR) {
            if !agent.trim().is_empty() {
                self.http.user_agent = agent;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_use_defaults() {
        let config = AppConfig::from_toml_str("[http]\ntimeout_seconds = 5\n").unwrap();
        assert_eq!(config.http.timeout_seconds, 5);
        assert_eq!(config.http.user_agent, DEFAULT_USER_AGENT);
        assert!(config.browser.headless);
        assert_eq!(config.output.dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = AppConfig::from_toml_str("[http]\ntimeout_seconds = 0\n").unwrap_err();
        assert!(matches!(err, ExtractError::Config(_)));
    }

    #[test]
    fn nonexistent_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.browser.max_scroll_rounds, 30);
    }
}
