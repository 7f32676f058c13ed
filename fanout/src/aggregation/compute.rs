//! Grouping of raw facts into aggregate rows.

use bigdecimal::BigDecimal;
use std::collections::BTreeMap;

use crate::aggregation::rounding::round_metric;
use crate::bail;
use crate::error::{ErrorKind, FanoutResult};
use crate::types::{AggregateRow, RawFact};

#[derive(Default)]
struct GroupTotal {
    sum: BigDecimal,
    count: i64,
}

/// Groups `facts` by group key and computes the rounded mean and the count of each group.
///
/// Rows are returned ascending by group key. The result only depends on the multiset of
/// facts, so splitting a fact set across batches differently yields the same rows. A fact
/// without a metric fails the whole computation with
/// [`ErrorKind::AggregationComputeError`].
pub fn aggregate_facts(facts: &[RawFact]) -> FanoutResult<Vec<AggregateRow>> {
    let mut groups: BTreeMap<i64, GroupTotal> = BTreeMap::new();

    for fact in facts {
        let Some(metric) = &fact.metric else {
            bail!(
                ErrorKind::AggregationComputeError,
                "Raw fact has no metric",
                format!("a fact of group {} has a null metric", fact.group_key)
            );
        };

        let total = groups.entry(fact.group_key).or_default();
        total.sum += metric;
        total.count += 1;
    }

    Ok(groups
        .into_iter()
        .map(|(group_key, total)| AggregateRow {
            group_key,
            metric_value: round_metric(&(total.sum / BigDecimal::from(total.count))),
            count: total.count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn fact(group_key: i64, metric: &str) -> RawFact {
        RawFact::new(group_key, Some(BigDecimal::from_str(metric).unwrap()))
    }

    #[test]
    fn computes_rounded_mean_and_count_per_group() {
        let facts = vec![
            fact(1, "4.0"),
            fact(2, "5.0"),
            fact(1, "3.5"),
            fact(1, "3.5"),
            fact(2, "2.5"),
        ];

        let rows = aggregate_facts(&facts).unwrap();

        assert_eq!(
            rows,
            vec![
                AggregateRow {
                    group_key: 1,
                    metric_value: BigDecimal::from_str("3.66667").unwrap(),
                    count: 3,
                },
                AggregateRow {
                    group_key: 2,
                    metric_value: BigDecimal::from_str("3.75000").unwrap(),
                    count: 2,
                },
            ]
        );
    }

    #[test]
    fn null_metric_is_a_compute_error() {
        let facts = vec![fact(1, "4.0"), RawFact::new(1, None)];

        let err = aggregate_facts(&facts).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AggregationComputeError);
    }

    #[test]
    fn no_facts_yield_no_rows() {
        assert!(aggregate_facts(&[]).unwrap().is_empty());
    }
}
