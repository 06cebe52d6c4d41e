//! # Runtime Configuration
//!
//! Loaded once at startup, either built in code or read from TOML:
//!
//! ```toml
//! strategy = "transactional"
//! max_transaction_retries = 64
//! thread_name_prefix = "worker"
//! stack_size = 262144
//! ```
//!
//! Missing keys take their defaults; unknown keys are rejected.

use std::path::Path;

use serde::Deserialize;

use crate::error::{RuntimeError, RuntimeResult};
use crate::region::StrategyKind;

/// Smallest stack accepted for a logical thread.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Retry bound used when none is configured.
pub const DEFAULT_TRANSACTION_RETRIES: u32 = 128;

/// Runtime settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Exclusion strategy of the region.
    pub strategy: StrategyKind,
    /// Aborted transactions tolerated before taking the fallback flag.
    pub max_transaction_retries: u32,
    /// Prefix of generated thread names (`<prefix>-<id>`).
    pub thread_name_prefix: String,
    /// Stack size of logical threads; the platform default when `None`.
    pub stack_size: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::build_default(),
            max_transaction_retries: DEFAULT_TRANSACTION_RETRIES,
            thread_name_prefix: String::from("logical"),
            stack_size: None,
        }
    }
}

impl RuntimeConfig {
    /// Default settings with an explicit strategy.
    #[must_use]
    pub fn with_strategy(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::InvalidConfig`] if the document does not parse or a
    /// value is out of range.
    pub fn from_toml_str(source: &str) -> RuntimeResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| RuntimeError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::ConfigIo`] if the file cannot be read, otherwise as
    /// [`RuntimeConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| RuntimeError::ConfigIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.max_transaction_retries == 0 {
            return Err(RuntimeError::InvalidConfig(
                "max_transaction_retries must be at least 1".into(),
            ));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(RuntimeError::InvalidConfig(
                "thread_name_prefix must not be empty".into(),
            ));
        }
        if let Some(size) = self.stack_size {
            if size < MIN_STACK_SIZE {
                return Err(RuntimeError::InvalidConfig(format!(
                    "stack_size {size} is below the minimum of {MIN_STACK_SIZE} bytes"
                )));
            }
        }
        Ok(())
    }
}
