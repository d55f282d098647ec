//! Engine configuration

use std::time::Duration;

use butterfly_common::{Error, Result};
use serde::Deserialize;

/// Edge length of one map grid cell
pub const DEFAULT_CELL_SIZE: i32 = 100;

/// Configuration for a [`FogArea`](crate::FogArea)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FogConfig {
    /// Edge length of a grid cell in map units
    pub cell_size: i32,

    /// Longest a worker pass waits for pending dependents before it gives up
    /// and requeues its candidate
    pub dependency_wait: Duration,

    /// Granularity of that wait
    pub poll_interval: Duration,

    /// Thread name of the background worker
    pub worker_name: String,
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            dependency_wait: Duration::from_secs(5),
            poll_interval: Duration::from_millis(20),
            worker_name: "fog-worker".to_string(),
        }
    }
}

impl FogConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cell_size <= 0 {
            return Err(Error::invalid_input(format!(
                "cell_size must be positive, got {}",
                self.cell_size
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::invalid_input("poll_interval must be non-zero"));
        }
        Ok(())
    }
}
