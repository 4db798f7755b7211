use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{AppResult, FieldErrors};
use crate::movies::repo_types::MovieFilter;
use crate::pagination::Pagination;
use crate::validation::required;

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_PLOT_LEN: usize = 5000;
/// First year a motion picture was recorded.
pub const MIN_YEAR: i32 = 1888;
/// Announced releases may be listed this many years ahead.
pub const YEARS_AHEAD: i32 = 10;

fn check_year(errors: &mut FieldErrors, field: &'static str, year: i32) {
    let max = OffsetDateTime::now_utc().year() + YEARS_AHEAD;
    if !(MIN_YEAR..=max).contains(&year) {
        errors.add(field, format!("must be between {MIN_YEAR} and {max}"));
    }
}

#[derive(Debug, Clone)]
pub struct CreateMovieCommand {
    pub title: String,
    pub plot: String,
    pub year_of_release: i32,
    pub created_by: Uuid,
}

impl CreateMovieCommand {
    pub fn new(title: &str, plot: &str, year_of_release: i32, created_by: Uuid) -> AppResult<Self> {
        let mut errors = FieldErrors::new();
        let title = required(&mut errors, "title", title, MAX_TITLE_LEN);
        let plot = required(&mut errors, "plot", plot, MAX_PLOT_LEN);
        check_year(&mut errors, "year_of_release", year_of_release);
        errors.into_result()?;
        Ok(Self {
            title: title.unwrap_or_default(),
            plot: plot.unwrap_or_default(),
            year_of_release,
            created_by,
        })
    }
}

/// Partial movie update; `None` leaves the field unchanged.
#[derive(Debug, Clone)]
pub struct UpdateMovieCommand {
    pub movie_id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub plot: Option<String>,
    pub year_of_release: Option<i32>,
}

impl UpdateMovieCommand {
    pub fn new(
        movie_id: Uuid,
        user_id: Uuid,
        title: Option<&str>,
        plot: Option<&str>,
        year_of_release: Option<i32>,
    ) -> AppResult<Self> {
        let mut errors = FieldErrors::new();
        let title = title.and_then(|t| required(&mut errors, "title", t, MAX_TITLE_LEN));
        let plot = plot.and_then(|p| required(&mut errors, "plot", p, MAX_PLOT_LEN));
        if let Some(year) = year_of_release {
            check_year(&mut errors, "year_of_release", year);
        }
        errors.into_result()?;
        Ok(Self {
            movie_id,
            user_id,
            title,
            plot,
            year_of_release,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.plot.is_none() && self.year_of_release.is_none()
    }
}

/// Combined movie search; every criterion is optional.
#[derive(Debug, Clone, Default)]
pub struct SearchMoviesCommand {
    pub title: Option<String>,
    pub plot: Option<String>,
    pub year: Option<i32>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub created_by: Option<Uuid>,
    pub page: Pagination,
}

impl SearchMoviesCommand {
    pub fn new(
        title: Option<&str>,
        plot: Option<&str>,
        year: Option<i32>,
        year_from: Option<i32>,
        year_to: Option<i32>,
        created_by: Option<Uuid>,
        page: Pagination,
    ) -> AppResult<Self> {
        let mut errors = FieldErrors::new();
        if let (Some(from), Some(to)) = (year_from, year_to) {
            if from > to {
                errors.add("year_from", "must not be after year_to");
            }
        }
        errors.into_result()?;
        let non_blank = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Ok(Self {
            title: non_blank(title),
            plot: non_blank(plot),
            year,
            year_from,
            year_to,
            created_by,
            page: page.clamped(),
        })
    }

    pub fn into_filter(self) -> MovieFilter {
        MovieFilter {
            title_contains: self.title,
            plot_contains: self.plot,
            year: self.year,
            year_from: self.year_from,
            year_to: self.year_to,
            created_by: self.created_by,
            page: self.page,
        }
    }
}
