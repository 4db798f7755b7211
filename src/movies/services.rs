use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::MOVIES_ACTIVE_TITLE_YEAR_IDX;
use crate::error::{AppError, AppResult};
use crate::movies::commands::{CreateMovieCommand, SearchMoviesCommand, UpdateMovieCommand};
use crate::movies::repo::MovieRepository;
use crate::movies::repo_types::{Movie, MovieFilter};
use crate::pagination::Pagination;
use crate::validation::is_blank;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMovieStatistics {
    pub user_id: Uuid,
    pub total_created: i64,
    pub active_created: i64,
    pub deactivated_created: i64,
}

fn duplicate(movie: &Movie) -> impl FnOnce(&str) -> Option<AppError> + '_ {
    move |constraint: &str| {
        (constraint == MOVIES_ACTIVE_TITLE_YEAR_IDX).then(|| AppError::DuplicateMovie {
            title: movie.title.clone(),
            year: movie.year_of_release,
        })
    }
}

pub struct ManageMovieService {
    movies: Arc<dyn MovieRepository>,
}

impl ManageMovieService {
    pub fn new(movies: Arc<dyn MovieRepository>) -> Self {
        Self { movies }
    }

    async fn load(&self, movie_id: Uuid) -> AppResult<Movie> {
        self.movies
            .find_by_id(movie_id)
            .await?
            .ok_or(AppError::MovieNotFound(movie_id))
    }

    fn authorize(movie: &Movie, user_id: Uuid, operation: &'static str) -> AppResult<()> {
        if movie.is_owned_by(user_id) {
            return Ok(());
        }
        warn!(movie_id = %movie.id, %user_id, operation, "not the movie creator");
        Err(AppError::unauthorized(movie.id, user_id, operation))
    }

    async fn ensure_unique(&self, title: &str, year: i32, exclude: Option<Uuid>) -> AppResult<()> {
        if self
            .movies
            .exists_active_by_title_and_year(title, year, exclude)
            .await?
        {
            warn!(%title, year, "duplicate movie");
            return Err(AppError::DuplicateMovie {
                title: title.to_string(),
                year,
            });
        }
        Ok(())
    }

    #[instrument(skip(self, cmd), fields(title = %cmd.title, year = cmd.year_of_release))]
    pub async fn create_movie(&self, cmd: CreateMovieCommand) -> AppResult<Movie> {
        self.ensure_unique(&cmd.title, cmd.year_of_release, None).await?;
        let movie = Movie::new(
            cmd.title,
            cmd.plot,
            cmd.year_of_release,
            cmd.created_by,
            OffsetDateTime::now_utc(),
        );
        let saved = self
            .movies
            .insert(&movie)
            .await
            .map_err(|e| AppError::from_write(e, duplicate(&movie)))?;
        info!(movie_id = %saved.id, created_by = %saved.created_by, "movie created");
        Ok(saved)
    }

    /// Active movies only.
    pub async fn get_movie(&self, movie_id: Uuid) -> AppResult<Movie> {
        let movie = self.load(movie_id).await?;
        if !movie.is_active() {
            return Err(AppError::MovieNotFound(movie_id));
        }
        Ok(movie)
    }

    #[instrument(skip(self, cmd), fields(movie_id = %cmd.movie_id, user_id = %cmd.user_id))]
    pub async fn update_movie(&self, cmd: UpdateMovieCommand) -> AppResult<Movie> {
        let movie = self.load(cmd.movie_id).await?;
        Self::authorize(&movie, cmd.user_id, "update")?;
        if cmd.is_empty() {
            return Ok(movie);
        }

        let title = cmd.title.as_deref().unwrap_or(&movie.title);
        let year = cmd.year_of_release.unwrap_or(movie.year_of_release);
        if title != movie.title || year != movie.year_of_release {
            self.ensure_unique(title, year, Some(movie.id)).await?;
        }

        let updated = movie.with_changes(cmd.title, cmd.plot, cmd.year_of_release, OffsetDateTime::now_utc());
        let saved = self
            .movies
            .update(&updated)
            .await
            .map_err(|e| AppError::from_write(e, duplicate(&updated)))?;
        info!(movie_id = %saved.id, "movie updated");
        Ok(saved)
    }

    async fn soft_delete(&self, movie_id: Uuid, user_id: Uuid, operation: &'static str) -> AppResult<Movie> {
        let movie = self.load(movie_id).await?;
        Self::authorize(&movie, user_id, operation)?;
        if !movie.is_active() {
            return Ok(movie);
        }
        let saved = self
            .movies
            .update(&movie.deactivated(user_id, OffsetDateTime::now_utc()))
            .await?;
        info!(%movie_id, %user_id, "movie deactivated");
        Ok(saved)
    }

    /// No-op when already inactive.
    #[instrument(skip(self))]
    pub async fn deactivate_movie(&self, movie_id: Uuid, user_id: Uuid) -> AppResult<Movie> {
        self.soft_delete(movie_id, user_id, "deactivate").await
    }

    #[instrument(skip(self))]
    pub async fn delete_movie(&self, movie_id: Uuid, user_id: Uuid) -> AppResult<Movie> {
        self.soft_delete(movie_id, user_id, "delete").await
    }

    /// No-op when already active. Fails if an active twin was created meanwhile.
    #[instrument(skip(self))]
    pub async fn reactivate_movie(&self, movie_id: Uuid, user_id: Uuid) -> AppResult<Movie> {
        let movie = self.load(movie_id).await?;
        Self::authorize(&movie, user_id, "reactivate")?;
        if movie.is_active() {
            return Ok(movie);
        }
        self.ensure_unique(&movie.title, movie.year_of_release, Some(movie.id))
            .await?;
        let reactivated = movie.activated(OffsetDateTime::now_utc());
        let saved = self
            .movies
            .update(&reactivated)
            .await
            .map_err(|e| AppError::from_write(e, duplicate(&reactivated)))?;
        info!(%movie_id, "movie reactivated");
        Ok(saved)
    }

    pub async fn get_movies_by_creator(&self, user_id: Uuid, page: Pagination) -> AppResult<Vec<Movie>> {
        self.find(MovieFilter {
            created_by: Some(user_id),
            page,
            ..Default::default()
        })
        .await
    }

    pub async fn search_movies_by_title(&self, fragment: &str, page: Pagination) -> AppResult<Vec<Movie>> {
        if is_blank(Some(fragment)) {
            return Err(AppError::invalid_field("title", "must not be blank"));
        }
        self.find(MovieFilter {
            title_contains: Some(fragment.trim().to_string()),
            page,
            ..Default::default()
        })
        .await
    }

    pub async fn search_movies_by_plot(&self, fragment: &str, page: Pagination) -> AppResult<Vec<Movie>> {
        if is_blank(Some(fragment)) {
            return Err(AppError::invalid_field("plot", "must not be blank"));
        }
        self.find(MovieFilter {
            plot_contains: Some(fragment.trim().to_string()),
            page,
            ..Default::default()
        })
        .await
    }

    pub async fn get_movies_by_year(&self, year: i32, page: Pagination) -> AppResult<Vec<Movie>> {
        self.find(MovieFilter {
            year: Some(year),
            page,
            ..Default::default()
        })
        .await
    }

    pub async fn get_movies_by_year_range(
        &self,
        year_from: i32,
        year_to: i32,
        page: Pagination,
    ) -> AppResult<Vec<Movie>> {
        let cmd = SearchMoviesCommand::new(None, None, None, Some(year_from), Some(year_to), None, page)?;
        self.search_movies(cmd).await
    }

    pub async fn search_movies(&self, cmd: SearchMoviesCommand) -> AppResult<Vec<Movie>> {
        self.find(cmd.into_filter()).await
    }

    async fn find(&self, mut filter: MovieFilter) -> AppResult<Vec<Movie>> {
        filter.page = filter.page.clamped();
        Ok(self.movies.search(&filter).await?)
    }

    pub async fn get_user_movie_statistics(&self, user_id: Uuid) -> AppResult<UserMovieStatistics> {
        let (total, active) = tokio::try_join!(
            self.movies.count_by_creator(user_id),
            self.movies.count_active_by_creator(user_id),
        )?;
        Ok(UserMovieStatistics {
            user_id,
            total_created: total,
            active_created: active,
            deactivated_created: total - active,
        })
    }
}
