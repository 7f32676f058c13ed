use tracing::info;

use crate::error::{ErrorKind, FanoutResult};
use crate::fanout_error;
use crate::store::{FactStore, JobStore};
use crate::types::{JobBatch, KeyRange};

/// Splits the inclusive range `[min_key, max_key]` into consecutive ranges of `width` keys.
///
/// The last range is clipped to `max_key`. Returns no ranges when `min_key > max_key` and
/// fails with [`ErrorKind::ConfigError`] when `width` is zero.
pub fn partition_key_range(min_key: i64, max_key: i64, width: u64) -> FanoutResult<Vec<KeyRange>> {
    if width == 0 {
        return Err(fanout_error!(
            ErrorKind::ConfigError,
            "Partition width must be greater than zero"
        ));
    }

    let mut ranges = Vec::new();
    if min_key > max_key {
        return Ok(ranges);
    }

    // A width beyond the i64 range covers the rest of the domain in one range.
    let step = i64::try_from(width - 1).unwrap_or(i64::MAX);
    let mut start_key = min_key;
    loop {
        let end_key = start_key.saturating_add(step).min(max_key);
        ranges.push(KeyRange::new(start_key, end_key));

        if end_key == max_key {
            break;
        }
        start_key = end_key + 1;
    }

    Ok(ranges)
}

/// Turns the current fact key domain into a fresh set of pending job batches.
#[derive(Debug, Clone, Copy)]
pub struct BatchPartitioner {
    width: u64,
}

impl BatchPartitioner {
    pub fn new(width: u64) -> Self {
        Self { width }
    }

    /// Replaces every job batch and staged aggregate with batches covering the domain.
    ///
    /// A domain that cannot be read fails with [`ErrorKind::PartitionError`]. An empty
    /// domain produces no batches.
    pub async fn create_job_batches<S>(&self, store: &S) -> FanoutResult<Vec<JobBatch>>
    where
        S: JobStore + FactStore,
    {
        let domain = store.fact_key_domain().await.map_err(|err| {
            fanout_error!(
                ErrorKind::PartitionError,
                "Failed to determine the fact key domain",
                err.summary(),
                source: err
            )
        })?;

        let ranges = match domain {
            Some(domain) => partition_key_range(domain.start_key, domain.end_key, self.width)?,
            None => Vec::new(),
        };

        info!(
            domain = ?domain,
            partition_width = self.width,
            batches = ranges.len(),
            "creating job batches"
        );

        store.recreate_job_batches(ranges).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryAggregationStore;

    #[test]
    fn last_range_is_clipped_to_max_key() {
        let ranges = partition_key_range(1, 2500, 1000).unwrap();

        assert_eq!(
            ranges,
            vec![
                KeyRange::new(1, 1000),
                KeyRange::new(1001, 2000),
                KeyRange::new(2001, 2500),
            ]
        );
    }

    #[test]
    fn ranges_cover_domain_without_overlap() {
        for (min_key, max_key, width) in [(1, 1, 1), (-7, 13, 4), (0, 999, 1000), (5, 105, 10)] {
            let ranges = partition_key_range(min_key, max_key, width).unwrap();

            assert_eq!(ranges.first().unwrap().start_key, min_key);
            assert_eq!(ranges.last().unwrap().end_key, max_key);
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].end_key + 1, pair[1].start_key);
            }
            let covered: u64 = ranges.iter().map(KeyRange::len).sum();
            assert_eq!(covered, KeyRange::new(min_key, max_key).len());
        }
    }

    #[test]
    fn empty_domain_has_no_ranges() {
        assert!(partition_key_range(10, 9, 1000).unwrap().is_empty());
    }

    #[test]
    fn zero_width_is_rejected() {
        let err = partition_key_range(1, 10, 0).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn domain_at_the_end_of_the_key_space_terminates() {
        let ranges = partition_key_range(i64::MAX - 5, i64::MAX, 4).unwrap();

        assert_eq!(
            ranges,
            vec![
                KeyRange::new(i64::MAX - 5, i64::MAX - 2),
                KeyRange::new(i64::MAX - 1, i64::MAX),
            ]
        );
    }

    #[tokio::test]
    async fn creates_pending_batches_for_domain() {
        let store = MemoryAggregationStore::new();
        store.set_key_domain(Some(KeyRange::new(1, 2500))).await;

        let batches = BatchPartitioner::new(1000)
            .create_job_batches(&store)
            .await
            .unwrap();

        let ids: Vec<_> = batches.iter().map(|batch| batch.batch_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(batches[2].range(), KeyRange::new(2001, 2500));
    }
}
