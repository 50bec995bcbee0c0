//! Configuration for the crawl core

mod crawl;
mod logging;

pub use crawl::{BlacklistSnapshot, CrawlConfig, DuplicatePolicy};
pub use logging::{LogFormat, LogLevel, LoggingConfig};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Crawl policy
    #[serde(default)]
    pub crawl: CrawlConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        Self::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {}", path.display(), e))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects every violation and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.crawl.validate_into(&mut errors);
        self.crawl.trap_detector.validate_into(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
