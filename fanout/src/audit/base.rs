use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::error::FanoutResult;
use crate::types::{MovieRecord, RatingRecord, Record};

/// A record that can be compared across stores.
///
/// Stores may keep unordered multi valued fields in any order, so records are compared
/// through [`Auditable::normalized`], which sorts them.
pub trait Auditable: Record {
    /// Comparable form of the record.
    type Normalized: PartialEq + Debug + Send;

    fn normalized(&self) -> Self::Normalized;
}

impl Auditable for MovieRecord {
    type Normalized = (String, Vec<String>);

    fn normalized(&self) -> Self::Normalized {
        let mut genres = self.genre_list();
        genres.sort_unstable();

        (self.title.clone(), genres)
    }
}

impl Auditable for RatingRecord {
    type Normalized = (String, i64);

    /// Ratings are compared by value, so `4.0` and `4.00` are equal.
    fn normalized(&self) -> Self::Normalized {
        (self.rating.normalized().to_string(), self.timestamp)
    }
}

/// Point reads of records by key, for the audit.
#[async_trait]
pub trait AuditReader<R: Auditable>: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the records stored under `keys`. Keys without a record are absent from the map.
    async fn read_records(&self, keys: &[R::Position]) -> FanoutResult<BTreeMap<R::Position, R>>;
}

/// The source of truth of an audit, which also enumerates its keys.
#[async_trait]
pub trait AuditSource<R: Auditable>: AuditReader<R> {
    /// Returns every key of the source, ascending.
    async fn all_keys(&self) -> FanoutResult<Vec<R::Position>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    #[test]
    fn genre_order_does_not_matter() {
        let source = MovieRecord::new(1, "Heat (1995)", "Crime|Action|Thriller");
        let sink = MovieRecord::new(1, "Heat (1995)", "Action|Crime|Thriller");

        assert_eq!(source.normalized(), sink.normalized());
    }

    #[test]
    fn titles_are_compared_exactly() {
        let source = MovieRecord::new(1, "Heat (1995)", "Action");
        let sink = MovieRecord::new(1, "Heat", "Action");

        assert_ne!(source.normalized(), sink.normalized());
    }

    #[test]
    fn rating_scale_does_not_matter() {
        let source = RatingRecord {
            user_id: 1,
            movie_id: 2,
            rating: BigDecimal::from_str("4.0").unwrap(),
            timestamp: 10,
        };
        let sink = RatingRecord {
            rating: BigDecimal::from_str("4.00").unwrap(),
            ..source.clone()
        };

        assert_eq!(source.normalized(), sink.normalized());
    }
}
