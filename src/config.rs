use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::chain::pow::{DEFAULT_DIFFICULTY, DEFAULT_MAX_ATTEMPTS, MAX_DIFFICULTY};
use crate::chain::MiningBudget;
use crate::error::{LedgerError, Result};
use crate::logging::{LogFormat, DEFAULT_FILTER};
use crate::validation::{LinkageMode, ValidationPolicy};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub difficulty: usize,
    pub mining: MiningConfig,
    pub validation: ValidationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub max_attempts: u64,
    /// Wall-clock limit per block; None mines until the attempt cap.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub linkage_mode: LinkageMode,
    pub verify_genesis: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://attendance-ledger.db".to_string(),
            difficulty: DEFAULT_DIFFICULTY,
            mining: MiningConfig::default(),
            validation: ValidationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout_ms: Some(30_000),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            linkage_mode: LinkageMode::CapturedAtCreation,
            verify_genesis: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file if given, then `LEDGER_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            LedgerError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| LedgerError::ConfigError(format!("Invalid configuration: {}", e)))
    }

    /// Apply overrides from `lookup`, normally the process environment
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("LEDGER_DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(value) = lookup("LEDGER_DIFFICULTY") {
            self.difficulty = parse_number("LEDGER_DIFFICULTY", &value)?;
        }
        if let Some(value) = lookup("LEDGER_MINING_MAX_ATTEMPTS") {
            self.mining.max_attempts = parse_number("LEDGER_MINING_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("LEDGER_MINING_TIMEOUT_MS") {
            // 0 disables the wall-clock limit.
            let ms: u64 = parse_number("LEDGER_MINING_TIMEOUT_MS", &value)?;
            self.mining.timeout_ms = (ms > 0).then_some(ms);
        }
        if let Some(value) = lookup("LEDGER_LINKAGE_MODE") {
            self.validation.linkage_mode = value.parse()?;
        }
        if let Some(value) = lookup("LEDGER_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::ConfigError(format!(
                "difficulty {} exceeds the maximum of {}",
                self.difficulty, MAX_DIFFICULTY
            )));
        }
        if self.mining.max_attempts == 0 {
            return Err(LedgerError::ConfigError(
                "mining.max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.mining.timeout_ms == Some(0) {
            return Err(LedgerError::ConfigError(
                "mining.timeout_ms must be greater than zero; omit it to mine without a deadline"
                    .to_string(),
            ));
        }
        if self.database_url.trim().is_empty() {
            return Err(LedgerError::ConfigError("database_url is empty".to_string()));
        }
        Ok(())
    }

    pub fn mining_budget(&self) -> MiningBudget {
        MiningBudget::new(
            self.mining.max_attempts,
            self.mining.timeout_ms.map(Duration::from_millis),
        )
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            linkage: self.validation.linkage_mode,
            verify_genesis: self.validation.verify_genesis,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| LedgerError::ConfigError(format!("{} is not a valid number: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.difficulty, 4);
        assert_eq!(config.mining.max_attempts, 50_000_000);
        assert_eq!(config.mining.timeout_ms, Some(30_000));
        assert_eq!(config.validation.linkage_mode, LinkageMode::CapturedAtCreation);
        assert!(config.validation.verify_genesis);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            difficulty = 2

            [validation]
            linkage_mode = "current_latest"
            "#,
        )
        .unwrap();
        assert_eq!(config.difficulty, 2);
        assert_eq!(config.validation.linkage_mode, LinkageMode::CurrentLatest);
        assert!(config.validation.verify_genesis);
        assert_eq!(config.database_url, "sqlite://attendance-ledger.db");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database_url = \"sqlite://custom.db\"\n[mining]\nmax_attempts = 10").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database_url, "sqlite://custom.db");
        assert_eq!(config.mining.max_attempts, 10);
        assert_eq!(config.mining_budget().max_attempts, 10);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("LEDGER_DIFFICULTY", "3"),
            ("LEDGER_MINING_TIMEOUT_MS", "0"),
            ("LEDGER_LINKAGE_MODE", "current_latest"),
            ("LEDGER_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.difficulty, 3);
        assert_eq!(config.mining.timeout_ms, None);
        assert!(config.mining_budget().timeout.is_none());
        assert_eq!(config.validation_policy().linkage, LinkageMode::CurrentLatest);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_bad_override_is_config_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|key| (key == "LEDGER_DIFFICULTY").then(|| "four".to_string()))
            .unwrap_err();
        assert!(matches!(err, LedgerError::ConfigError(_)));
    }

    #[test]
    fn test_validation_limits() {
        let mut config = AppConfig::default();
        config.difficulty = 65;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.mining.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_in_file_is_rejected() {
        let config = AppConfig::from_toml("[mining]\ntimeout_ms = 0").unwrap();
        assert_eq!(config.mining.timeout_ms, Some(0));
        assert!(matches!(config.validate(), Err(LedgerError::ConfigError(_))));

        // Zero from the environment clears the deadline instead.
        let mut config = AppConfig::from_toml("[mining]\nmax_attempts = 5").unwrap();
        assert_eq!(config.mining.timeout_ms, Some(30_000));
        config
            .apply_overrides(|key| (key == "LEDGER_MINING_TIMEOUT_MS").then(|| "0".to_string()))
            .unwrap();
        assert!(config.validate().is_ok());
        assert!(config.mining_budget().timeout.is_none());
    }
}
