use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::lifecycle::Lifecycle;
use crate::pagination::Pagination;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieRating {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16, // 1..=10
    pub review: Option<String>,
    pub lifecycle: Lifecycle,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl MovieRating {
    pub fn new(
        movie_id: Uuid,
        user_id: Uuid,
        rating: i16,
        review: Option<String>,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            movie_id,
            user_id,
            rating,
            review,
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    pub fn has_review(&self) -> bool {
        self.review.as_deref().is_some_and(|r| !r.trim().is_empty())
    }

    pub fn with_changes(
        mut self,
        rating: Option<i16>,
        review: Option<Option<String>>,
        now: OffsetDateTime,
    ) -> Self {
        if let Some(rating) = rating {
            self.rating = rating;
        }
        if let Some(review) = review {
            self.review = review;
        }
        self.updated_at = now;
        self
    }

    pub fn deactivated(mut self, by: Uuid, now: OffsetDateTime) -> Self {
        self.lifecycle = Lifecycle::Inactive { at: now, by: Some(by) };
        self.updated_at = now;
        self
    }
}

/// Filter for rating reads; only active ratings are ever returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RatingFilter {
    pub movie_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub min_rating: Option<i16>,
    pub max_rating: Option<i16>,
    pub has_review: Option<bool>,
    pub page: Pagination,
}

impl RatingFilter {
    pub fn matches(&self, r: &MovieRating) -> bool {
        r.is_active()
            && self.movie_id.map_or(true, |m| r.movie_id == m)
            && self.user_id.map_or(true, |u| r.user_id == u)
            && self.min_rating.map_or(true, |min| r.rating >= min)
            && self.max_rating.map_or(true, |max| r.rating <= max)
            && self.has_review.map_or(true, |h| r.has_review() == h)
    }
}

/// Row shape of the `movie_ratings` table.
#[derive(Debug, Clone, FromRow)]
pub struct MovieRatingRow {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub review: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deactivated_at: Option<OffsetDateTime>,
    pub deactivated_by: Option<Uuid>,
}

impl From<MovieRatingRow> for MovieRating {
    fn from(r: MovieRatingRow) -> Self {
        Self {
            lifecycle: Lifecycle::from_columns(r.is_active, r.deactivated_at, r.deactivated_by, r.updated_at),
            id: r.id,
            movie_id: r.movie_id,
            user_id: r.user_id,
            rating: r.rating,
            review: r.review,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_review_does_not_count_as_review() {
        let now = OffsetDateTime::now_utc();
        let r = MovieRating::new(Uuid::new_v4(), Uuid::new_v4(), 7, Some("   ".into()), now);
        assert!(!r.has_review());
        let r = r.with_changes(None, Some(Some("Great".into())), now);
        assert!(r.has_review());
        assert_eq!(r.rating, 7);
        let r = r.with_changes(Some(8), None, now);
        assert_eq!(r.review.as_deref(), Some("Great"));
        let r = r.with_changes(None, Some(None), now);
        assert!(r.review.is_none());
    }

    #[test]
    fn filter_matches_rating_bounds() {
        let r = MovieRating::new(Uuid::new_v4(), Uuid::new_v4(), 6, None, OffsetDateTime::now_utc());
        let f = RatingFilter {
            min_rating: Some(5),
            max_rating: Some(6),
            has_review: Some(false),
            ..Default::default()
        };
        assert!(f.matches(&r));
        let f = RatingFilter {
            min_rating: Some(7),
            ..Default::default()
        };
        assert!(!f.matches(&r));
    }
}
