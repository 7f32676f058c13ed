use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::ValidationError;

/// Settings of the replication conductor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReplicationConfig {
    /// Maximum number of records read and applied per iteration, shared by every sink.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Deadline, in milliseconds, for each individual source read and sink call.
    ///
    /// When `None`, calls wait until the underlying store returns or times out natively.
    #[serde(default)]
    pub operation_timeout_ms: Option<u64>,
}

impl ReplicationConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 1000;

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "replication.batch_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.operation_timeout_ms == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "replication.operation_timeout_ms".to_string(),
                constraint: "must be greater than 0 when set".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            operation_timeout_ms: None,
        }
    }
}

fn default_batch_size() -> usize {
    ReplicationConfig::DEFAULT_BATCH_SIZE
}
