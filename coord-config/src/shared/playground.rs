use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::{FanInConfig, SemaphoreConfig, ValidationError, WorkerPoolConfig};

/// Top-level configuration of the playground binary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlaygroundConfig {
    #[serde(default)]
    pub worker_pool: WorkerPoolConfig,
    #[serde(default)]
    pub semaphore: SemaphoreConfig,
    #[serde(default)]
    pub fan_in: FanInConfig,
}

impl PlaygroundConfig {
    /// Validates every section, reporting the first invalid field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.worker_pool.validate()?;
        self.semaphore.validate()?;
        self.fan_in.validate()?;

        Ok(())
    }
}

impl Config for PlaygroundConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
