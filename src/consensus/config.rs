//! Engine configuration
//!
//! Loaded from JSON; every field has a default so partial files are fine.

use crate::mining::{EmptyBlockPolicy, DEFAULT_MAX_BLOCK_TXS, DEFAULT_MEMPOOL_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Parameters for a consensus engine and its shared state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on transactions per block
    pub max_block_transactions: usize,
    /// Time between production cycles
    pub block_interval_ms: u64,
    /// Start a cycle early once this many transactions are pending
    pub pool_threshold: Option<usize>,
    /// Maximum number of pending transactions
    pub pool_capacity: usize,
    /// Behaviour when a cycle finds the pool empty
    pub empty_blocks: EmptyBlockPolicy,
    /// Default grace period for `stop`
    pub stop_timeout_ms: u64,
    /// Blocks buffered per subscriber before old ones are dropped
    pub broadcast_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_block_transactions: DEFAULT_MAX_BLOCK_TXS,
            block_interval_ms: 1_000,
            pool_threshold: None,
            pool_capacity: DEFAULT_MEMPOOL_SIZE,
            empty_blocks: EmptyBlockPolicy::Skip,
            stop_timeout_ms: 5_000,
            broadcast_capacity: 100,
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = fs::File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty JSON form, as written by `block-engine config`
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "block_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_block_transactions == 0 {
            return Err(ConfigError::Invalid(
                "max_block_transactions must be greater than zero".to_string(),
            ));
        }
        if self.pool_capacity < self.max_block_transactions {
            return Err(ConfigError::Invalid(format!(
                "pool_capacity ({}) is smaller than max_block_transactions ({})",
                self.pool_capacity, self.max_block_transactions
            )));
        }
        if self.pool_threshold == Some(0) {
            return Err(ConfigError::Invalid(
                "pool_threshold must be greater than zero when set".to_string(),
            ));
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::Invalid(
                "broadcast_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.block_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.empty_blocks, EmptyBlockPolicy::Skip);
        assert_eq!(config.block_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("engine.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"block_interval_ms": 250, "empty_blocks": "produce", "pool_threshold": 8}}"#
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.block_interval_ms, 250);
        assert_eq!(config.empty_blocks, EmptyBlockPolicy::Produce);
        assert_eq!(config.pool_threshold, Some(8));
        assert_eq!(config.max_block_transactions, DEFAULT_MAX_BLOCK_TXS);
    }

    #[test]
    fn test_json_round_trip() {
        let config = EngineConfig {
            pool_threshold: Some(3),
            ..Default::default()
        };
        let parsed: EngineConfig = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_values() {
        let zero_interval = EngineConfig {
            block_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_interval.validate(),
            Err(ConfigError::Invalid(_))
        ));

        let tiny_pool = EngineConfig {
            pool_capacity: 1,
            max_block_transactions: 10,
            ..Default::default()
        };
        assert!(matches!(tiny_pool.validate(), Err(ConfigError::Invalid(_))));

        let zero_block = EngineConfig {
            max_block_transactions: 0,
            ..Default::default()
        };
        assert!(zero_block.validate().is_err());
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("nope.json");
        assert!(matches!(
            EngineConfig::from_file(&missing),
            Err(ConfigError::Io(_))
        ));

        let malformed = temp_dir.path().join("bad.json");
        fs::write(&malformed, "{ not json").unwrap();
        assert!(matches!(
            EngineConfig::from_file(&malformed),
            Err(ConfigError::Parse(_))
        ));

        let invalid = temp_dir.path().join("invalid.json");
        fs::write(&invalid, r#"{"max_block_transactions": 0}"#).unwrap();
        assert!(matches!(
            EngineConfig::from_file(&invalid),
            Err(ConfigError::Invalid(_))
        ));
    }
}
