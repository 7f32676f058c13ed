use bigdecimal::BigDecimal;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::types::{MovieRecord, RatingRecord, RawFact, RecordBatch};

/// Genres cycled through by [`movies`].
const GENRES: [&str; 4] = ["Drama", "Comedy|Romance", "Action|Adventure|Sci-Fi", "Animation|Children"];

/// Parses a decimal literal.
pub fn decimal(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).expect("valid decimal literal")
}

/// Builds one movie per id in `ids`.
pub fn movies(ids: RangeInclusive<i64>) -> Vec<MovieRecord> {
    ids.map(|movie_id| {
        let genres = GENRES[(movie_id.unsigned_abs() % GENRES.len() as u64) as usize];
        MovieRecord::new(movie_id, format!("Movie {movie_id}"), genres)
    })
    .collect()
}

/// Builds a rating of every movie in `movie_ids` by every user in `user_ids`, ascending by
/// `(user_id, movie_id)`.
pub fn ratings(user_ids: RangeInclusive<i64>, movie_ids: RangeInclusive<i64>) -> Vec<RatingRecord> {
    let mut ratings = Vec::new();
    for user_id in user_ids {
        for movie_id in movie_ids.clone() {
            ratings.push(RatingRecord {
                user_id,
                movie_id,
                rating: BigDecimal::from((user_id + movie_id) % 5 + 1),
                timestamp: 1_700_000_000 + user_id * 1_000 + movie_id,
            });
        }
    }

    ratings
}

/// Builds a batch of [`movies`].
pub fn movie_batch(ids: RangeInclusive<i64>) -> RecordBatch<MovieRecord> {
    RecordBatch::new(movies(ids)).expect("ascending movie ids")
}

/// Builds well formed facts from `(group_key, metric)` pairs.
pub fn facts(values: &[(i64, &str)]) -> Vec<RawFact> {
    values
        .iter()
        .map(|(group_key, metric)| RawFact::new(*group_key, Some(decimal(metric))))
        .collect()
}

/// Builds `per_key` facts for every key in `keys`, with metrics cycling through 1 to 5.
pub fn uniform_facts(keys: RangeInclusive<i64>, per_key: i64) -> Vec<RawFact> {
    keys.flat_map(|group_key| {
        (0..per_key).map(move |n| RawFact::new(group_key, Some(BigDecimal::from(n % 5 + 1))))
    })
    .collect()
}
