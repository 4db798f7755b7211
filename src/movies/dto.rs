use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppResult;
use crate::lifecycle::Lifecycle;
use crate::movies::commands::SearchMoviesCommand;
use crate::movies::repo_types::Movie;
use crate::pagination::Pagination;

#[derive(Debug, Deserialize)]
pub struct CreateMovieRequest {
    pub title: String,
    pub plot: String,
    pub year_of_release: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMovieRequest {
    pub title: Option<String>,
    pub plot: Option<String>,
    pub year_of_release: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchMoviesQuery {
    pub title: Option<String>,
    pub plot: Option<String>,
    pub year: Option<i32>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub created_by: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl SearchMoviesQuery {
    pub fn into_command(self) -> AppResult<SearchMoviesCommand> {
        SearchMoviesCommand::new(
            self.title.as_deref(),
            self.plot.as_deref(),
            self.year,
            self.year_from,
            self.year_to,
            self.created_by,
            Pagination::from_query(self.limit, self.offset),
        )
    }
}

/// `?q=` fragment search over one text field.
#[derive(Debug, Default, Deserialize)]
pub struct FragmentQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FragmentQuery {
    pub fn page(&self) -> Pagination {
        Pagination::from_query(self.limit, self.offset)
    }
}

#[derive(Debug, Deserialize)]
pub struct YearRangeQuery {
    pub from: i32,
    pub to: i32,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MovieResponse {
    pub id: Uuid,
    pub title: String,
    pub plot: String,
    pub year_of_release: i32,
    pub created_by: Uuid,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Movie> for MovieResponse {
    fn from(m: Movie) -> Self {
        Self {
            id: m.id,
            title: m.title,
            plot: m.plot,
            year_of_release: m.year_of_release,
            created_by: m.created_by,
            lifecycle: m.lifecycle,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_is_flattened_into_the_response() {
        let by = Uuid::new_v4();
        let movie = Movie::new("Heat".into(), "LA".into(), 1995, by, OffsetDateTime::UNIX_EPOCH)
            .deactivated(by, OffsetDateTime::UNIX_EPOCH);
        let json = serde_json::to_value(MovieResponse::from(movie)).unwrap();
        assert_eq!(json["state"], "inactive");
        assert_eq!(json["by"], by.to_string());
        assert_eq!(json["title"], "Heat");
    }
}
