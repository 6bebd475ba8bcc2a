use crate::error::{AntispamError, Result};
use crate::rules::RuleDefinition;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of every inter-stage queue, ingress included
    pub chan_size: usize,
    /// Number of regex evaluations allowed to run at once
    pub max_concurrency: usize,
    /// Minimum keyword length in bytes
    pub min_keyword_len: usize,
    pub aggregation_window_secs: u64,
}

impl PipelineConfig {
    pub fn aggregation_window(&self) -> Duration {
        Duration::from_secs(self.aggregation_window_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chan_size: 1024,
            max_concurrency: 64,
            min_keyword_len: 5,
            aggregation_window_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
    /// How often expired sender counters are evicted
    pub counter_cleanup_interval_secs: u64,
}

impl StorageConfig {
    pub fn counter_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.counter_cleanup_interval_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://antispam.db".to_string(),
            counter_cleanup_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AntispamError::Config(e.to_string()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| AntispamError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            rules: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.chan_size == 0 {
            return Err(AntispamError::Config(
                "pipeline.chan_size must be greater than 0".to_string(),
            ));
        }
        if self.pipeline.max_concurrency == 0 {
            return Err(AntispamError::Config(
                "pipeline.max_concurrency must be greater than 0".to_string(),
            ));
        }
        if self.pipeline.aggregation_window_secs == 0 {
            return Err(AntispamError::Config(
                "pipeline.aggregation_window_secs must be greater than 0".to_string(),
            ));
        }
        if self.storage.counter_cleanup_interval_secs == 0 {
            return Err(AntispamError::Config(
                "storage.counter_cleanup_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Operation;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pipeline.chan_size, 1024);
        assert_eq!(config.pipeline.min_keyword_len, 5);
        assert_eq!(config.pipeline.aggregation_window(), Duration::from_secs(1));
        assert!(config.rules.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.pipeline.max_concurrency, 64);
        assert_eq!(config.storage.database_url, "sqlite://antispam.db");
        assert_eq!(config.storage.counter_cleanup_interval(), Duration::from_secs(60));
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_parse_rules_and_overrides() {
        let config = Config::from_toml(
            r#"
            [pipeline]
            max_concurrency = 4
            min_keyword_len = 3

            [[rules]]
            name = "cheap-followers"
            area = "comment"
            operation = "limit"
            pattern = "cheap\\s+followers"

            [[rules]]
            name = "brand"
            area = "comment"
            operation = "whitelist"
            pattern = "official"
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.max_concurrency, 4);
        assert_eq!(config.pipeline.min_keyword_len, 3);
        assert_eq!(config.pipeline.chan_size, 1024);
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].operation, Operation::Limit);
        assert_eq!(config.rules[1].operation, Operation::Whitelist);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(Config::from_toml("[pipeline]\nchan_size = 0").is_err());
        assert!(Config::from_toml("[pipeline]\nmax_concurrency = 0").is_err());
        assert!(Config::from_toml("[pipeline]\naggregation_window_secs = 0").is_err());
        assert!(Config::from_toml("[storage]\ncounter_cleanup_interval_secs = 0").is_err());
    }

    #[test]
    fn test_unknown_operation_is_config_error() {
        let result = Config::from_toml(
            r#"
            [[rules]]
            name = "x"
            area = "comment"
            operation = "block"
            pattern = "x"
            "#,
        );
        assert!(matches!(result, Err(AntispamError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\ndatabase_url = \"sqlite::memory:\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.storage.database_url, "sqlite::memory:");
    }

    #[test]
    fn test_from_missing_file() {
        let result = Config::from_file("/nonexistent/antispam.toml");
        assert!(matches!(result, Err(AntispamError::Config(_))));
    }
}
