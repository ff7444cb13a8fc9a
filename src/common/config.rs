use crate::common::constants::*;
use crate::common::error::{Result, ScraperError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration: built-in defaults, then an optional TOML file,
/// then environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_dir: PathBuf,
    pub user_agent: String,
    /// Overrides the budget and football timeouts when set
    pub http_timeout_seconds: Option<u64>,
    pub budget: BudgetConfig,
    pub football: FootballConfig,
    pub inpc: InpcConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub url: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FootballConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InpcConfig {
    pub url: String,
    pub timeout_seconds: u64,
    pub min_pdf_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_timeout_seconds: None,
            budget: BudgetConfig::default(),
            football: FootballConfig::default(),
            inpc: InpcConfig::default(),
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BUDGET_URL.to_string(),
            timeout_seconds: DEFAULT_BUDGET_TIMEOUT_SECS,
            max_retries: DEFAULT_BUDGET_MAX_RETRIES,
            retry_delay_seconds: DEFAULT_BUDGET_RETRY_DELAY_SECS,
        }
    }
}

impl Default for FootballConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FOOTBALL_URL.to_string(),
            timeout_seconds: DEFAULT_FOOTBALL_TIMEOUT_SECS,
        }
    }
}

impl Default for InpcConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_INPC_PDF_URL.to_string(),
            timeout_seconds: DEFAULT_INPC_TIMEOUT_SECS,
            min_pdf_bytes: DEFAULT_INPC_MIN_PDF_BYTES,
        }
    }
}

impl Config {
    /// Load `.env`, the optional config file (`SCRAPER_CONFIG`, default
    /// `config.toml`) and environment overrides.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let config_path =
            std::env::var("SCRAPER_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        let mut config = Self::from_file_if_exists(Path::new(&config_path))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file_if_exists(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BUDGET_URL") {
            self.budget.url = v;
        }
        if let Some(v) = get("FOOTBALL_URL") {
            self.football.url = v;
        }
        if let Some(v) = get("INPC_PDF_URL") {
            self.inpc.url = v;
        }
        if let Some(v) = get("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("USER_AGENT") {
            self.user_agent = v;
        }
        if let Some(v) = get("HTTP_TIMEOUT_SECONDS") {
            self.http_timeout_seconds = Some(parse_env("HTTP_TIMEOUT_SECONDS", &v)?);
        }
        if let Some(v) = get("BUDGET_MAX_RETRIES") {
            self.budget.max_retries = parse_env("BUDGET_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("BUDGET_RETRY_DELAY_SECONDS") {
            self.budget.retry_delay_seconds = parse_env("BUDGET_RETRY_DELAY_SECONDS", &v)?;
        }
        if let Some(v) = get("INPC_MIN_PDF_BYTES") {
            self.inpc.min_pdf_bytes = parse_env("INPC_MIN_PDF_BYTES", &v)?;
        }
        Ok(())
    }

    fn timeout(&self, source_default: u64) -> Duration {
        Duration::from_secs(self.http_timeout_seconds.unwrap_or(source_default))
    }

    pub fn budget_timeout(&self) -> Duration {
        self.timeout(self.budget.timeout_seconds)
    }

    pub fn football_timeout(&self) -> Duration {
        self.timeout(self.football.timeout_seconds)
    }

    /// The PDF download keeps its own timeout regardless of the global override.
    pub fn inpc_timeout(&self) -> Duration {
        Duration::from_secs(self.inpc.timeout_seconds)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ScraperError::Config(format!("{key} must be a non-negative integer, got '{value}'")))
}
