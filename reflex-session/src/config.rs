use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The stimulus delay range is half-open, so `min` must be below `max`.
    #[error("stimulus delay range {min}..{max} ms is empty")]
    InvalidDelayRange { min: u64, max: u64 },

    /// Delays are drawn in microseconds, so the bound must fit after scaling.
    #[error("stimulus delay bound {max} ms is too large")]
    DelayTooLarge { max: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Half-open range the stimulus delay is drawn from.
    pub delay_range_ms: (u64, u64),
    /// How many attempts the summary lists.
    pub recent_count: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            delay_range_ms: (2000, 5000),
            recent_count: 5,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = self.delay_range_ms;
        if min >= max {
            return Err(ConfigError::InvalidDelayRange { min, max });
        }
        if max.checked_mul(1_000).is_none() {
            return Err(ConfigError::DelayTooLarge { max });
        }
        Ok(())
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.delay_range_ms.0)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.delay_range_ms.1)
    }
}
