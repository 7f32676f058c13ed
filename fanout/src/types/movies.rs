use bigdecimal::BigDecimal;

use crate::types::Record;

/// A movie as stored in the source catalog.
///
/// `genres` holds the raw pipe separated list, e.g. `"Adventure|Comedy"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieRecord {
    pub movie_id: i64,
    pub title: String,
    pub genres: String,
}

impl MovieRecord {
    pub fn new(movie_id: i64, title: impl Into<String>, genres: impl Into<String>) -> Self {
        Self {
            movie_id,
            title: title.into(),
            genres: genres.into(),
        }
    }

    /// Returns the genre names of this movie.
    ///
    /// Every sink maps genres through this function, and the auditor compares against it, so
    /// the mapping must stay deterministic: names are split on `|`, trimmed (a trailing `\r`
    /// from CSV imports included) and empty names are dropped.
    pub fn genre_list(&self) -> Vec<String> {
        self.genres
            .split('|')
            .map(str::trim)
            .filter(|genre| !genre.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

impl Record for MovieRecord {
    type Position = i64;

    fn position(&self) -> i64 {
        self.movie_id
    }
}

/// A single user rating of a movie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingRecord {
    pub user_id: i64,
    pub movie_id: i64,
    pub rating: BigDecimal,
    /// Seconds since the Unix epoch at which the rating was given.
    pub timestamp: i64,
}

impl Record for RatingRecord {
    type Position = (i64, i64);

    fn position(&self) -> (i64, i64) {
        (self.user_id, self.movie_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genre_list_splits_and_trims() {
        let movie = MovieRecord::new(1, "Toy Story (1995)", "Adventure| Animation |Children\r");

        assert_eq!(
            movie.genre_list(),
            vec!["Adventure", "Animation", "Children"]
        );
    }

    #[test]
    fn genre_list_drops_empty_names() {
        assert!(MovieRecord::new(1, "Untitled", "").genre_list().is_empty());
        assert_eq!(
            MovieRecord::new(2, "Heat (1995)", "Action||Crime|").genre_list(),
            vec!["Action", "Crime"]
        );
    }

    #[test]
    fn rating_position_is_user_then_movie() {
        let rating = RatingRecord {
            user_id: 4,
            movie_id: 17,
            rating: BigDecimal::from(3),
            timestamp: 964_982_703,
        };

        assert_eq!(rating.position(), (4, 17));
    }
}
