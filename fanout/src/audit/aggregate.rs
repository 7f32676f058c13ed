use fanout_config::shared::AuditConfig;
use metrics::gauge;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info, warn};

use crate::aggregation::compute::aggregate_facts;
use crate::audit::report::{AuditReport, Mismatch};
use crate::audit::sample::{sample_keys, sample_size};
use crate::error::FanoutResult;
use crate::metrics::{AUDIT_LABEL, FANOUT_AUDIT_MISMATCHES};
use crate::store::{AggregateStore, FactStore};
use crate::types::KeyRange;

/// Name the live aggregate table is reported under.
const LIVE_AGGREGATES_TARGET: &str = "live_aggregates";

/// Recomputes a random sample of aggregates from the raw facts and compares them with the
/// live table.
///
/// Expected rows go through the same computation and rounding as the aggregation worker, so
/// only real drift is reported.
#[derive(Debug, Clone)]
pub struct AggregateAuditor<S> {
    store: S,
    config: AuditConfig,
}

impl<S> AggregateAuditor<S>
where
    S: FactStore + AggregateStore + Sync,
{
    pub fn new(store: S, config: AuditConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(&self) -> FanoutResult<AuditReport<i64>> {
        self.run_with_rng(&mut StdRng::from_entropy()).await
    }

    pub async fn run_with_rng<G>(&self, rng: &mut G) -> FanoutResult<AuditReport<i64>>
    where
        G: Rng + Send,
    {
        let group_keys = self.store.fact_group_keys().await?;
        if group_keys.is_empty() {
            warn!("no raw facts, nothing to audit");
            return Ok(AuditReport {
                sampled: 0,
                mismatches: Vec::new(),
            });
        }

        let size = sample_size(
            group_keys.len(),
            self.config.sample_fraction,
            self.config.min_sample_size,
        );
        let mut sample = sample_keys(&group_keys, size, rng);
        sample.sort_unstable();

        info!(
            total = group_keys.len(),
            sampled = sample.len(),
            "auditing sampled aggregates"
        );

        let live = self.store.get_live_aggregates(&sample).await?;

        let mut mismatches = Vec::new();
        for group_key in &sample {
            let facts = self
                .store
                .read_facts(KeyRange::new(*group_key, *group_key))
                .await?;

            let expected = match aggregate_facts(&facts) {
                Ok(rows) => rows.into_iter().next(),
                Err(err) => {
                    mismatches.push(Mismatch::Unverifiable {
                        target: LIVE_AGGREGATES_TARGET.to_string(),
                        key: *group_key,
                        reason: err.summary(),
                    });
                    continue;
                }
            };

            let mismatch = match (expected, live.get(group_key)) {
                (None, None) => continue,
                (Some(_), None) => Mismatch::Missing {
                    target: LIVE_AGGREGATES_TARGET.to_string(),
                    key: *group_key,
                },
                (expected, Some(actual)) if expected.as_ref() != Some(actual) => {
                    Mismatch::Differs {
                        target: LIVE_AGGREGATES_TARGET.to_string(),
                        key: *group_key,
                        expected: format!("{expected:?}"),
                        actual: format!("{actual:?}"),
                    }
                }
                _ => continue,
            };

            error!(group_key, mismatch = ?mismatch, "aggregate mismatch found");
            mismatches.push(mismatch);
        }

        gauge!(FANOUT_AUDIT_MISMATCHES, AUDIT_LABEL => "aggregates").set(mismatches.len() as f64);

        Ok(AuditReport {
            sampled: sample.len(),
            mismatches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    use crate::store::JobStore;
    use crate::store::memory::MemoryAggregationStore;
    use crate::types::{AggregateRow, RawFact};

    fn full_sample() -> AuditConfig {
        AuditConfig {
            sample_fraction: 1.0,
            min_sample_size: 1,
        }
    }

    fn rating(group_key: i64, value: &str) -> RawFact {
        RawFact::new(group_key, Some(BigDecimal::from_str(value).unwrap()))
    }

    #[tokio::test]
    async fn detects_stale_and_missing_aggregates() {
        let store = MemoryAggregationStore::with_facts([
            rating(1, "4.0"),
            rating(1, "3.0"),
            rating(2, "5.0"),
            rating(3, "1.0"),
        ]);
        store
            .recreate_job_batches(vec![KeyRange::new(1, 3)])
            .await
            .unwrap();
        store
            .commit_batch_aggregates(
                1,
                vec![
                    AggregateRow {
                        group_key: 1,
                        metric_value: BigDecimal::from_str("3.50000").unwrap(),
                        count: 2,
                    },
                    AggregateRow {
                        group_key: 2,
                        metric_value: BigDecimal::from_str("4.00000").unwrap(),
                        count: 1,
                    },
                ],
            )
            .await
            .unwrap();
        store.promote_staged_aggregates().await.unwrap();

        let report = AggregateAuditor::new(store, full_sample())
            .run_with_rng(&mut StdRng::seed_from_u64(3))
            .await
            .unwrap();

        assert_eq!(report.sampled, 3);
        assert_eq!(report.mismatches.len(), 2);
        assert!(matches!(report.mismatches[0], Mismatch::Differs { key: 2, .. }));
        assert!(matches!(report.mismatches[1], Mismatch::Missing { key: 3, .. }));
    }

    #[tokio::test]
    async fn malformed_facts_are_unverifiable() {
        let store = MemoryAggregationStore::with_facts([RawFact::new(8, None)]);

        let report = AggregateAuditor::new(store, full_sample()).run().await.unwrap();

        assert!(!report.is_consistent());
        assert!(matches!(
            report.mismatches[0],
            Mismatch::Unverifiable { key: 8, .. }
        ));
    }
}
