//! SchedulerConfig - 実行時設定
//!
//! JSON から読み込めます。省略したキーはデフォルト値になります。
//!
//! ```json
//! {
//!   "search": { "weekday_window_days": 7, "exclusion_limit": 365 },
//!   "ancestors_fire_triggers": true,
//!   "rollover_poll_ms": 60000
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::SearchLimits;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{field} must be at least {min}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: u64,
        value: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub search: SearchLimits,
    /// Ancestors completed by the parent cascade activate their own trigger targets.
    pub ancestors_fire_triggers: bool,
    /// How often the rollover loop looks at the clock.
    pub rollover_poll_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            search: SearchLimits::default(),
            ancestors_fire_triggers: true,
            rollover_poll_ms: 60_000,
        }
    }
}

impl SchedulerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn rollover_poll_interval(&self) -> Duration {
        Duration::from_millis(self.rollover_poll_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("search.weekday_window_days", 7, u64::from(self.search.weekday_window_days)),
            ("search.exclusion_limit", 1, u64::from(self.search.exclusion_limit)),
            ("rollover_poll_ms", 10, self.rollover_poll_ms),
        ];
        for (field, min, value) in checks {
            if value < min {
                return Err(ConfigError::OutOfRange { field, min, value });
            }
        }
        Ok(())
    }
}
