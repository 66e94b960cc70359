use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Fan-in merge settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FanInConfig {
    /// Merged values buffered before the forwarder waits for the consumer.
    #[serde(default = "default_output_capacity")]
    pub output_capacity: usize,
}

impl FanInConfig {
    pub const DEFAULT_OUTPUT_CAPACITY: usize = 64;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.output_capacity == 0 {
            return Err(ValidationError::must_be_positive("fan_in.output_capacity"));
        }

        Ok(())
    }
}

impl Default for FanInConfig {
    fn default() -> Self {
        Self {
            output_capacity: default_output_capacity(),
        }
    }
}

fn default_output_capacity() -> usize {
    FanInConfig::DEFAULT_OUTPUT_CAPACITY
}
