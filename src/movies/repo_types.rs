use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::lifecycle::Lifecycle;
use crate::pagination::Pagination;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub plot: String,
    pub year_of_release: i32,
    pub created_by: Uuid,
    pub lifecycle: Lifecycle,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Movie {
    pub fn new(
        title: String,
        plot: String,
        year_of_release: i32,
        created_by: Uuid,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            plot,
            year_of_release,
            created_by,
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.created_by == user_id
    }

    pub fn with_changes(
        mut self,
        title: Option<String>,
        plot: Option<String>,
        year_of_release: Option<i32>,
        now: OffsetDateTime,
    ) -> Self {
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(plot) = plot {
            self.plot = plot;
        }
        if let Some(year) = year_of_release {
            self.year_of_release = year;
        }
        self.updated_at = now;
        self
    }

    pub fn deactivated(mut self, by: Uuid, now: OffsetDateTime) -> Self {
        self.lifecycle = Lifecycle::Inactive { at: now, by: Some(by) };
        self.updated_at = now;
        self
    }

    pub fn activated(mut self, now: OffsetDateTime) -> Self {
        self.lifecycle = Lifecycle::Active;
        self.updated_at = now;
        self
    }
}

/// Filter for movie reads; only active movies are ever returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieFilter {
    pub title_contains: Option<String>,
    pub plot_contains: Option<String>,
    pub year: Option<i32>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub created_by: Option<Uuid>,
    pub page: Pagination,
}

impl MovieFilter {
    pub fn matches(&self, movie: &Movie) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            needle
                .as_ref()
                .map_or(true, |n| haystack.to_lowercase().contains(&n.to_lowercase()))
        }
        movie.is_active()
            && contains(&movie.title, &self.title_contains)
            && contains(&movie.plot, &self.plot_contains)
            && self.year.map_or(true, |y| movie.year_of_release == y)
            && self.year_from.map_or(true, |y| movie.year_of_release >= y)
            && self.year_to.map_or(true, |y| movie.year_of_release <= y)
            && self.created_by.map_or(true, |u| movie.created_by == u)
    }
}

/// Row shape of the `movies` table.
#[derive(Debug, Clone, FromRow)]
pub struct MovieRow {
    pub id: Uuid,
    pub title: String,
    pub plot: String,
    pub year_of_release: i32,
    pub created_by: Uuid,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deactivated_at: Option<OffsetDateTime>,
    pub deactivated_by: Option<Uuid>,
}

impl From<MovieRow> for Movie {
    fn from(r: MovieRow) -> Self {
        Self {
            lifecycle: Lifecycle::from_columns(r.is_active, r.deactivated_at, r.deactivated_by, r.updated_at),
            id: r.id,
            title: r.title,
            plot: r.plot,
            year_of_release: r.year_of_release,
            created_by: r.created_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
