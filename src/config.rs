use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use page_harness_core::SearchParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_title_boost")]
    pub title_boost: f64,
    #[serde(default = "default_url_boost")]
    pub url_boost: f64,
    #[serde(default = "default_limit")]
    pub suggest_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            title_boost: default_title_boost(),
            url_boost: default_url_boost(),
            suggest_limit: default_limit(),
        }
    }
}

fn default_limit() -> usize {
    10
}
fn default_title_boost() -> f64 {
    1.2
}
fn default_url_boost() -> f64 {
    1.1
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Tuning handed to the core search and suggest engines.
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            default_limit: self.retrieval.default_limit,
            title_boost: self.retrieval.title_boost,
            url_boost: self.retrieval.url_boost,
            suggest_limit: self.retrieval.suggest_limit,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval
    if config.retrieval.default_limit < 1 {
        anyhow::bail!("retrieval.default_limit must be >= 1");
    }
    if config.retrieval.suggest_limit < 1 {
        anyhow::bail!("retrieval.suggest_limit must be >= 1");
    }
    if config.retrieval.title_boost.is_nan() || config.retrieval.title_boost < 1.0 {
        anyhow::bail!("retrieval.title_boost must be >= 1.0");
    }
    if config.retrieval.url_boost.is_nan() || config.retrieval.url_boost < 1.0 {
        anyhow::bail!("retrieval.url_boost must be >= 1.0");
    }

    // Validate logging
    match config.logging.level.to_ascii_lowercase().as_str() {
        "error" | "warn" | "info" | "debug" | "trace" => {}
        other => anyhow::bail!(
            "Unknown logging.level: '{}'. Must be error, warn, info, debug, or trace.",
            other
        ),
    }

    Ok(config)
}
