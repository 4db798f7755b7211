//! Aggregates computed over already-loaded rating lists.

use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ratings::repo_types::MovieRating;

pub const RATING_MIN: i16 = 1;
pub const RATING_MAX: i16 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieRatingStatistics {
    pub movie_id: Uuid,
    pub total_ratings: i64,
    pub average_rating: f64,
    pub min_rating: i16,
    pub max_rating: i16,
    pub ratings_with_reviews: i64,
    /// Count per score, one bucket for every value in RATING_MIN..=RATING_MAX.
    pub distribution: BTreeMap<i16, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRatingStatistics {
    pub user_id: Uuid,
    pub total_ratings: i64,
    pub average_rating: f64,
    pub min_rating: i16,
    pub max_rating: i16,
    pub ratings_with_reviews: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub first_rating_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_rating_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopRatedMovie {
    pub movie_id: Uuid,
    pub average_rating: f64,
    pub rating_count: i64,
}

pub fn empty_distribution() -> BTreeMap<i16, i64> {
    (RATING_MIN..=RATING_MAX).map(|score| (score, 0)).collect()
}

pub fn distribution(ratings: &[MovieRating]) -> BTreeMap<i16, i64> {
    let mut buckets = empty_distribution();
    for r in ratings {
        if let Some(count) = buckets.get_mut(&r.rating) {
            *count += 1;
        }
    }
    buckets
}

pub fn mean(ratings: &[MovieRating]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(r.rating)).sum();
    sum as f64 / ratings.len() as f64
}

fn reviewed(ratings: &[MovieRating]) -> i64 {
    ratings.iter().filter(|r| r.has_review()).count() as i64
}

/// Assembles movie statistics from the count and average reads plus the
/// active rating list. An empty list always reports an average of 0.0.
pub fn movie_statistics(
    movie_id: Uuid,
    total_ratings: i64,
    average: Option<f64>,
    ratings: &[MovieRating],
) -> MovieRatingStatistics {
    if ratings.is_empty() {
        return MovieRatingStatistics {
            movie_id,
            total_ratings,
            average_rating: 0.0,
            min_rating: 0,
            max_rating: 0,
            ratings_with_reviews: 0,
            distribution: empty_distribution(),
        };
    }
    MovieRatingStatistics {
        movie_id,
        total_ratings,
        average_rating: average.unwrap_or(0.0),
        min_rating: ratings.iter().map(|r| r.rating).min().unwrap_or(0),
        max_rating: ratings.iter().map(|r| r.rating).max().unwrap_or(0),
        ratings_with_reviews: reviewed(ratings),
        distribution: distribution(ratings),
    }
}

pub fn user_statistics(user_id: Uuid, ratings: &[MovieRating]) -> UserRatingStatistics {
    UserRatingStatistics {
        user_id,
        total_ratings: ratings.len() as i64,
        average_rating: mean(ratings),
        min_rating: ratings.iter().map(|r| r.rating).min().unwrap_or(0),
        max_rating: ratings.iter().map(|r| r.rating).max().unwrap_or(0),
        ratings_with_reviews: reviewed(ratings),
        first_rating_at: ratings.iter().map(|r| r.created_at).min(),
        last_rating_at: ratings.iter().map(|r| r.created_at).max(),
    }
}
