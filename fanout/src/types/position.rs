use std::fmt::Debug;

/// Totally ordered resume position of a sink.
///
/// A position marks that every record up to and including it has been durably applied.
/// Composite positions compare lexicographically, which matches SQL row-value comparison
/// such as `(user_id, movie_id) > ($1, $2)`.
pub trait Position: Ord + Clone + Debug + Send + Sync + 'static {
    /// Returns the position that precedes every real record.
    fn zero() -> Self;
}

impl Position for i64 {
    fn zero() -> Self {
        0
    }
}

impl Position for (i64, i64) {
    fn zero() -> Self {
        (0, 0)
    }
}

/// A record that can be replicated from a source to sinks.
pub trait Record: Clone + Debug + Send + Sync + 'static {
    /// Type of the natural key used as the resume position.
    type Position: Position;

    /// Returns the natural key of this record.
    fn position(&self) -> Self::Position;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_positions_order_lexicographically() {
        assert!((1, 9) < (2, 1));
        assert!((2, 1) < (2, 2));
        assert!(<(i64, i64)>::zero() < (0, 1));
        assert_eq!(i64::zero(), 0);
    }
}
