use std::fmt;
use std::str::FromStr;

use crate::bail;
use crate::error::{ErrorKind, FanoutError};

/// Identifier of a persisted job batch.
pub type JobBatchId = i64;

/// Inclusive range of raw-fact keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyRange {
    pub start_key: i64,
    pub end_key: i64,
}

impl KeyRange {
    pub fn new(start_key: i64, end_key: i64) -> Self {
        Self { start_key, end_key }
    }

    /// Returns the number of keys in the range, zero when `start_key > end_key`.
    pub fn len(&self) -> u64 {
        if self.start_key > self.end_key {
            return 0;
        }

        self.end_key.abs_diff(self.start_key) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: i64) -> bool {
        self.start_key <= key && key <= self.end_key
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start_key, self.end_key)
    }
}

/// Lifecycle state of a job batch.
///
/// Batches move `Pending -> Processing -> Complete | Failed`. An operator re-run moves
/// `Failed` and stale `Processing` batches back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn as_static_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_static_str())
    }
}

impl FromStr for JobStatus {
    type Err = FanoutError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            other => bail!(
                ErrorKind::ConversionError,
                "Unknown job batch status",
                format!("'{other}' is not a valid job batch status")
            ),
        }
    }
}

/// A persisted unit of aggregation work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobBatch {
    pub batch_id: JobBatchId,
    pub start_key: i64,
    pub end_key: i64,
    pub status: JobStatus,
    /// Cause of the last failure, kept until the batch is reset.
    pub last_error: Option<String>,
}

impl JobBatch {
    pub fn range(&self) -> KeyRange {
        KeyRange::new(self.start_key, self.end_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_range_len_and_contains() {
        let range = KeyRange::new(2001, 2500);

        assert_eq!(range.len(), 500);
        assert!(range.contains(2001));
        assert!(range.contains(2500));
        assert!(!range.contains(2501));
        assert!(KeyRange::new(5, 4).is_empty());
    }

    #[test]
    fn job_status_parses_its_own_names() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Complete,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_static_str().parse::<JobStatus>().unwrap(), status);
        }

        let err = "done".parse::<JobStatus>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }
}
