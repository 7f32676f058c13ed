use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Settings of the consistency audit.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuditConfig {
    /// Fraction of source keys sampled per audit, in `(0, 1]`.
    #[serde(default = "default_sample_fraction")]
    pub sample_fraction: f64,
    /// Lower bound of the sample size, so tiny domains are still audited.
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: usize,
}

impl AuditConfig {
    pub const DEFAULT_SAMPLE_FRACTION: f64 = 0.05;

    pub const DEFAULT_MIN_SAMPLE_SIZE: usize = 1;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "audit.sample_fraction".to_string(),
                constraint: "must be in (0, 1]".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sample_fraction: default_sample_fraction(),
            min_sample_size: default_min_sample_size(),
        }
    }
}

fn default_sample_fraction() -> f64 {
    AuditConfig::DEFAULT_SAMPLE_FRACTION
}

fn default_min_sample_size() -> usize {
    AuditConfig::DEFAULT_MIN_SAMPLE_SIZE
}
