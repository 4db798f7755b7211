use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppResult;
use crate::lifecycle::Lifecycle;
use crate::pagination::Pagination;
use crate::ratings::commands::SearchRatingsCommand;
use crate::ratings::repo_types::MovieRating;

const DEFAULT_TOP_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct RateMovieRequest {
    pub rating: i16,
    pub review: Option<String>,
}

/// An empty `review` string removes the review; omit it to keep the current one.
#[derive(Debug, Deserialize)]
pub struct UpdateRatingRequest {
    pub rating: Option<i16>,
    pub review: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchRatingsQuery {
    pub movie_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub min_rating: Option<i16>,
    pub max_rating: Option<i16>,
    pub has_review: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl SearchRatingsQuery {
    pub fn into_command(self) -> AppResult<SearchRatingsCommand> {
        SearchRatingsCommand::new(
            self.movie_id,
            self.user_id,
            self.min_rating,
            self.max_rating,
            self.has_review,
            Pagination::from_query(self.limit, self.offset),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TopRatedQuery {
    pub limit: Option<i64>,
    pub min_count: Option<i64>,
}

impl TopRatedQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_TOP_LIMIT)
    }

    pub fn min_count(&self) -> i64 {
        self.min_count.unwrap_or(1)
    }
}

#[derive(Debug, Serialize)]
pub struct RatedResponse {
    pub rated: bool,
}

#[derive(Debug, Serialize)]
pub struct CanModifyResponse {
    pub can_modify: bool,
}

#[derive(Debug, Serialize)]
pub struct RatingResponse {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub review: Option<String>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<MovieRating> for RatingResponse {
    fn from(r: MovieRating) -> Self {
        Self {
            id: r.id,
            movie_id: r.movie_id,
            user_id: r.user_id,
            rating: r.rating,
            review: r.review,
            lifecycle: r.lifecycle,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
