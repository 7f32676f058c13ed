use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

use crate::shared::ValidationError;

/// Settings of the aggregation dispatcher.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AggregationConfig {
    /// Number of consecutive keys covered by one job batch.
    #[serde(default = "default_partition_width")]
    pub partition_width: u64,
    /// Maximum number of job batches processed at once.
    ///
    /// Defaults to the available parallelism of the host.
    #[serde(default)]
    pub max_workers: Option<u16>,
}

impl AggregationConfig {
    pub const DEFAULT_PARTITION_WIDTH: u64 = 1000;

    /// Returns the size of the worker pool.
    pub fn worker_count(&self) -> usize {
        match self.max_workers {
            Some(max_workers) => usize::from(max_workers),
            None => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.partition_width == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "aggregation.partition_width".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.max_workers == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "aggregation.max_workers".to_string(),
                constraint: "must be greater than 0 when set".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            partition_width: default_partition_width(),
            max_workers: None,
        }
    }
}

fn default_partition_width() -> u64 {
    AggregationConfig::DEFAULT_PARTITION_WIDTH
}
