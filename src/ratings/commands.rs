use uuid::Uuid;

use crate::error::{AppResult, FieldErrors};
use crate::pagination::Pagination;
use crate::ratings::repo_types::RatingFilter;
use crate::ratings::stats::{RATING_MAX, RATING_MIN};

pub const MAX_REVIEW_LEN: usize = 5000;

fn check_rating(errors: &mut FieldErrors, field: &'static str, rating: i16) {
    if !(RATING_MIN..=RATING_MAX).contains(&rating) {
        errors.add(field, format!("must be between {RATING_MIN} and {RATING_MAX}"));
    }
}

/// Blank reviews are stored as no review.
fn normalize_review(errors: &mut FieldErrors, review: Option<&str>) -> Option<String> {
    let review = review.map(str::trim).filter(|r| !r.is_empty())?;
    if review.chars().count() > MAX_REVIEW_LEN {
        errors.add("review", format!("must be at most {MAX_REVIEW_LEN} characters"));
        return None;
    }
    Some(review.to_string())
}

#[derive(Debug, Clone)]
pub struct CreateRatingCommand {
    pub movie_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub review: Option<String>,
}

impl CreateRatingCommand {
    pub fn new(movie_id: Uuid, user_id: Uuid, rating: i16, review: Option<&str>) -> AppResult<Self> {
        let mut errors = FieldErrors::new();
        check_rating(&mut errors, "rating", rating);
        let review = normalize_review(&mut errors, review);
        errors.into_result()?;
        Ok(Self {
            movie_id,
            user_id,
            rating,
            review,
        })
    }
}

/// Partial rating update; `None` leaves the field unchanged.
/// `review: Some(None)` clears the stored review.
#[derive(Debug, Clone)]
pub struct UpdateRatingCommand {
    pub rating_id: Uuid,
    pub user_id: Uuid,
    pub rating: Option<i16>,
    pub review: Option<Option<String>>,
}

impl UpdateRatingCommand {
    pub fn new(
        rating_id: Uuid,
        user_id: Uuid,
        rating: Option<i16>,
        review: Option<&str>,
    ) -> AppResult<Self> {
        let mut errors = FieldErrors::new();
        if let Some(r) = rating {
            check_rating(&mut errors, "rating", r);
        }
        // a present but blank review clears it
        let review = review.map(|r| normalize_review(&mut errors, Some(r)));
        errors.into_result()?;
        Ok(Self {
            rating_id,
            user_id,
            rating,
            review,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchRatingsCommand {
    pub movie_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub min_rating: Option<i16>,
    pub max_rating: Option<i16>,
    pub has_review: Option<bool>,
    pub page: Pagination,
}

impl SearchRatingsCommand {
    pub fn new(
        movie_id: Option<Uuid>,
        user_id: Option<Uuid>,
        min_rating: Option<i16>,
        max_rating: Option<i16>,
        has_review: Option<bool>,
        page: Pagination,
    ) -> AppResult<Self> {
        let mut errors = FieldErrors::new();
        if let Some(min) = min_rating {
            check_rating(&mut errors, "min_rating", min);
        }
        if let Some(max) = max_rating {
            check_rating(&mut errors, "max_rating", max);
        }
        if let (Some(min), Some(max)) = (min_rating, max_rating) {
            if min > max {
                errors.add("min_rating", "must not exceed max_rating");
            }
        }
        errors.into_result()?;
        Ok(Self {
            movie_id,
            user_id,
            min_rating,
            max_rating,
            has_review,
            page: page.clamped(),
        })
    }

    pub fn into_filter(self) -> RatingFilter {
        RatingFilter {
            movie_id: self.movie_id,
            user_id: self.user_id,
            min_rating: self.min_rating,
            max_rating: self.max_rating,
            has_review: self.has_review,
            page: self.page,
        }
    }
}
