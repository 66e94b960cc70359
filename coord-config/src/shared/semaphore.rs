use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Counting semaphore settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SemaphoreConfig {
    /// Number of permits available to holders at once.
    #[serde(default = "default_permits")]
    pub permits: usize,
    /// Upper bound, in milliseconds, for a single acquisition. `None` waits indefinitely.
    #[serde(default)]
    pub acquire_timeout_ms: Option<u64>,
}

impl SemaphoreConfig {
    pub const DEFAULT_PERMITS: usize = 3;

    /// Largest permit count a semaphore can hold.
    pub const MAX_PERMITS: usize = usize::MAX >> 3;

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }

    /// Ensures the permit count is between 1 and [`Self::MAX_PERMITS`] and the timeout, if any,
    /// is non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.permits == 0 {
            return Err(ValidationError::must_be_positive("semaphore.permits"));
        }

        if self.permits > Self::MAX_PERMITS {
            return Err(ValidationError::must_be_at_most(
                "semaphore.permits",
                Self::MAX_PERMITS,
            ));
        }

        if self.acquire_timeout_ms == Some(0) {
            return Err(ValidationError::must_be_positive(
                "semaphore.acquire_timeout_ms",
            ));
        }

        Ok(())
    }
}

impl Default for SemaphoreConfig {
    fn default() -> Self {
        Self {
            permits: default_permits(),
            acquire_timeout_ms: None,
        }
    }
}

fn default_permits() -> usize {
    SemaphoreConfig::DEFAULT_PERMITS
}
