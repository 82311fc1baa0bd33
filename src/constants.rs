//! Defaults and environment variable names shared across the crate.

pub const DEFAULT_CONFIG_PATH: &str = "hs_scraper.toml";
pub const CONFIG_ENV_VAR: &str = "HS_SCRAPER_CONFIG";
pub const USER_AGENT_ENV_VAR: &str = "HS_SCRAPER_USER_AGENT";

// Several target sites serve a stripped page to non-browser agents
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_OUTPUT_DIR: &str = "output";
