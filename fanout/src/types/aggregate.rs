use bigdecimal::BigDecimal;

/// A raw fact read from the fact store.
///
/// The group key doubles as the partition key: job batch ranges are expressed over it,
/// which keeps the groups staged by different batches disjoint. `metric` is `None` when
/// the stored value is missing, which makes the fact malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFact {
    pub group_key: i64,
    pub metric: Option<BigDecimal>,
}

impl RawFact {
    pub fn new(group_key: i64, metric: Option<BigDecimal>) -> Self {
        Self { group_key, metric }
    }
}

/// A staged or live aggregate row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateRow {
    pub group_key: i64,
    /// Mean of the group's metrics, rounded to five fractional digits.
    pub metric_value: BigDecimal,
    pub count: i64,
}
