use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::map_write_error;
use crate::movies::repo_types::{Movie, MovieFilter, MovieRow};
use crate::users::repo::like_pattern;

#[async_trait]
pub trait MovieRepository: Send + Sync {
    /// Any lifecycle state.
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Movie>>;
    /// Whether an active movie other than `exclude` has this (title, year).
    async fn exists_active_by_title_and_year(
        &self,
        title: &str,
        year_of_release: i32,
        exclude: Option<Uuid>,
    ) -> anyhow::Result<bool>;
    async fn insert(&self, movie: &Movie) -> anyhow::Result<Movie>;
    async fn update(&self, movie: &Movie) -> anyhow::Result<Movie>;
    async fn search(&self, filter: &MovieFilter) -> anyhow::Result<Vec<Movie>>;
    async fn count_by_creator(&self, user_id: Uuid) -> anyhow::Result<i64>;
    async fn count_active_by_creator(&self, user_id: Uuid) -> anyhow::Result<i64>;
}

const MOVIE_COLUMNS: &str = "id, title, plot, year_of_release, created_by, is_active, \
    created_at, updated_at, deactivated_at, deactivated_by";

#[derive(Clone)]
pub struct PgMovieRepository {
    db: PgPool,
}

impl PgMovieRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &MovieFilter) {
    qb.push(" WHERE is_active");
    if let Some(title) = &filter.title_contains {
        qb.push(" AND title ILIKE ").push_bind(like_pattern(title));
    }
    if let Some(plot) = &filter.plot_contains {
        qb.push(" AND plot ILIKE ").push_bind(like_pattern(plot));
    }
    if let Some(year) = filter.year {
        qb.push(" AND year_of_release = ").push_bind(year);
    }
    if let Some(from) = filter.year_from {
        qb.push(" AND year_of_release >= ").push_bind(from);
    }
    if let Some(to) = filter.year_to {
        qb.push(" AND year_of_release <= ").push_bind(to);
    }
    if let Some(created_by) = filter.created_by {
        qb.push(" AND created_by = ").push_bind(created_by);
    }
}

#[async_trait]
impl MovieRepository for PgMovieRepository {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Movie>> {
        let sql = format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE id = $1");
        let row = sqlx::query_as::<_, MovieRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find movie by id")?;
        Ok(row.map(Movie::from))
    }

    async fn exists_active_by_title_and_year(
        &self,
        title: &str,
        year_of_release: i32,
        exclude: Option<Uuid>,
    ) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM movies
                 WHERE is_active AND title = $1 AND year_of_release = $2
                   AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(title)
        .bind(year_of_release)
        .bind(exclude)
        .fetch_one(&self.db)
        .await
        .context("exists active movie by title and year")?;
        Ok(exists)
    }

    async fn insert(&self, movie: &Movie) -> anyhow::Result<Movie> {
        let sql = format!(
            r#"
            INSERT INTO movies (id, title, plot, year_of_release, created_by, is_active,
                                created_at, updated_at, deactivated_at, deactivated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {MOVIE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, MovieRow>(&sql)
            .bind(movie.id)
            .bind(&movie.title)
            .bind(&movie.plot)
            .bind(movie.year_of_release)
            .bind(movie.created_by)
            .bind(movie.lifecycle.is_active())
            .bind(movie.created_at)
            .bind(movie.updated_at)
            .bind(movie.lifecycle.deactivated_at())
            .bind(movie.lifecycle.deactivated_by())
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_write_error(e, "insert movie"))?;
        Ok(row.into())
    }

    async fn update(&self, movie: &Movie) -> anyhow::Result<Movie> {
        let sql = format!(
            r#"
            UPDATE movies
               SET title = $2, plot = $3, year_of_release = $4, is_active = $5,
                   updated_at = $6, deactivated_at = $7, deactivated_by = $8
             WHERE id = $1
            RETURNING {MOVIE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, MovieRow>(&sql)
            .bind(movie.id)
            .bind(&movie.title)
            .bind(&movie.plot)
            .bind(movie.year_of_release)
            .bind(movie.lifecycle.is_active())
            .bind(movie.updated_at)
            .bind(movie.lifecycle.deactivated_at())
            .bind(movie.lifecycle.deactivated_by())
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_write_error(e, "update movie"))?;
        Ok(row.into())
    }

    async fn search(&self, filter: &MovieFilter) -> anyhow::Result<Vec<Movie>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {MOVIE_COLUMNS} FROM movies"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY year_of_release DESC, title ASC LIMIT ")
            .push_bind(filter.page.limit)
            .push(" OFFSET ")
            .push_bind(filter.page.offset);
        let rows = qb
            .build_query_as::<MovieRow>()
            .fetch_all(&self.db)
            .await
            .context("search movies")?;
        Ok(rows.into_iter().map(Movie::from).collect())
    }

    async fn count_by_creator(&self, user_id: Uuid) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM movies WHERE created_by = $1"#)
            .bind(user_id)
            .fetch_one(&self.db)
            .await
            .context("count movies by creator")?;
        Ok(count)
    }

    async fn count_active_by_creator(&self, user_id: Uuid) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM movies WHERE created_by = $1 AND is_active"#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .context("count active movies by creator")?;
        Ok(count)
    }
}
