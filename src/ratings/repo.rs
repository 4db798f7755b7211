use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::map_write_error;
use crate::ratings::repo_types::{MovieRating, MovieRatingRow, RatingFilter};

#[async_trait]
pub trait MovieRatingRepository: Send + Sync {
    /// Any lifecycle state.
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<MovieRating>>;
    async fn exists_active_by_movie_and_user(&self, movie_id: Uuid, user_id: Uuid) -> anyhow::Result<bool>;
    async fn insert(&self, rating: &MovieRating) -> anyhow::Result<MovieRating>;
    /// Also the soft-delete path: an inactive lifecycle is persisted as-is.
    async fn update(&self, rating: &MovieRating) -> anyhow::Result<MovieRating>;
    async fn count_active_by_movie(&self, movie_id: Uuid) -> anyhow::Result<i64>;
    /// `None` when the movie has no active ratings.
    async fn average_by_movie(&self, movie_id: Uuid) -> anyhow::Result<Option<f64>>;
    async fn find_all_active_by_movie(&self, movie_id: Uuid) -> anyhow::Result<Vec<MovieRating>>;
    async fn find_all_active_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<MovieRating>>;
    async fn search(&self, filter: &RatingFilter) -> anyhow::Result<Vec<MovieRating>>;
    /// Active movies with at least `min_rating_count` active ratings, best average first.
    async fn top_rated_movie_ids(&self, limit: i64, min_rating_count: i64) -> anyhow::Result<Vec<Uuid>>;
}

const RATING_COLUMNS: &str = "id, movie_id, user_id, rating, review, is_active, \
    created_at, updated_at, deactivated_at, deactivated_by";

#[derive(Clone)]
pub struct PgMovieRatingRepository {
    db: PgPool,
}

impl PgMovieRatingRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_all_active_by(&self, column: &str, id: Uuid) -> anyhow::Result<Vec<MovieRating>> {
        let sql = format!(
            "SELECT {RATING_COLUMNS} FROM movie_ratings \
             WHERE {column} = $1 AND is_active ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, MovieRatingRow>(&sql)
            .bind(id)
            .fetch_all(&self.db)
            .await
            .with_context(|| format!("list active ratings by {column}"))?;
        Ok(rows.into_iter().map(MovieRating::from).collect())
    }
}

#[async_trait]
impl MovieRatingRepository for PgMovieRatingRepository {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<MovieRating>> {
        let sql = format!("SELECT {RATING_COLUMNS} FROM movie_ratings WHERE id = $1");
        let row = sqlx::query_as::<_, MovieRatingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find rating by id")?;
        Ok(row.map(MovieRating::from))
    }

    async fn exists_active_by_movie_and_user(&self, movie_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM movie_ratings
                 WHERE movie_id = $1 AND user_id = $2 AND is_active
            )
            "#,
        )
        .bind(movie_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .context("exists active rating by movie and user")?;
        Ok(exists)
    }

    async fn insert(&self, rating: &MovieRating) -> anyhow::Result<MovieRating> {
        let sql = format!(
            r#"
            INSERT INTO movie_ratings (id, movie_id, user_id, rating, review, is_active,
                                       created_at, updated_at, deactivated_at, deactivated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {RATING_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, MovieRatingRow>(&sql)
            .bind(rating.id)
            .bind(rating.movie_id)
            .bind(rating.user_id)
            .bind(rating.rating)
            .bind(&rating.review)
            .bind(rating.lifecycle.is_active())
            .bind(rating.created_at)
            .bind(rating.updated_at)
            .bind(rating.lifecycle.deactivated_at())
            .bind(rating.lifecycle.deactivated_by())
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_write_error(e, "insert rating"))?;
        Ok(row.into())
    }

    async fn update(&self, rating: &MovieRating) -> anyhow::Result<MovieRating> {
        let sql = format!(
            r#"
            UPDATE movie_ratings
               SET rating = $2, review = $3, is_active = $4, updated_at = $5,
                   deactivated_at = $6, deactivated_by = $7
             WHERE id = $1
            RETURNING {RATING_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, MovieRatingRow>(&sql)
            .bind(rating.id)
            .bind(rating.rating)
            .bind(&rating.review)
            .bind(rating.lifecycle.is_active())
            .bind(rating.updated_at)
            .bind(rating.lifecycle.deactivated_at())
            .bind(rating.lifecycle.deactivated_by())
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_write_error(e, "update rating"))?;
        Ok(row.into())
    }

    async fn count_active_by_movie(&self, movie_id: Uuid) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM movie_ratings WHERE movie_id = $1 AND is_active"#,
        )
        .bind(movie_id)
        .fetch_one(&self.db)
        .await
        .context("count active ratings by movie")?;
        Ok(count)
    }

    async fn average_by_movie(&self, movie_id: Uuid) -> anyhow::Result<Option<f64>> {
        let avg: Option<f64> = sqlx::query_scalar(
            r#"SELECT AVG(rating)::float8 FROM movie_ratings WHERE movie_id = $1 AND is_active"#,
        )
        .bind(movie_id)
        .fetch_one(&self.db)
        .await
        .context("average rating by movie")?;
        Ok(avg)
    }

    async fn find_all_active_by_movie(&self, movie_id: Uuid) -> anyhow::Result<Vec<MovieRating>> {
        self.find_all_active_by("movie_id", movie_id).await
    }

    async fn find_all_active_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<MovieRating>> {
        self.find_all_active_by("user_id", user_id).await
    }

    async fn search(&self, filter: &RatingFilter) -> anyhow::Result<Vec<MovieRating>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {RATING_COLUMNS} FROM movie_ratings WHERE is_active"
        ));
        if let Some(movie_id) = filter.movie_id {
            qb.push(" AND movie_id = ").push_bind(movie_id);
        }
        if let Some(user_id) = filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(min) = filter.min_rating {
            qb.push(" AND rating >= ").push_bind(min);
        }
        if let Some(max) = filter.max_rating {
            qb.push(" AND rating <= ").push_bind(max);
        }
        match filter.has_review {
            Some(true) => {
                qb.push(" AND review IS NOT NULL AND btrim(review) <> ''");
            }
            Some(false) => {
                qb.push(" AND (review IS NULL OR btrim(review) = '')");
            }
            None => {}
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.page.limit)
            .push(" OFFSET ")
            .push_bind(filter.page.offset);
        let rows = qb
            .build_query_as::<MovieRatingRow>()
            .fetch_all(&self.db)
            .await
            .context("search ratings")?;
        Ok(rows.into_iter().map(MovieRating::from).collect())
    }

    async fn top_rated_movie_ids(&self, limit: i64, min_rating_count: i64) -> anyhow::Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT r.movie_id
              FROM movie_ratings r
              JOIN movies m ON m.id = r.movie_id AND m.is_active
             WHERE r.is_active
             GROUP BY r.movie_id
            HAVING COUNT(*) >= $2
             ORDER BY AVG(r.rating) DESC, COUNT(*) DESC, r.movie_id
             LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(min_rating_count)
        .fetch_all(&self.db)
        .await
        .context("top rated movie ids")?;
        Ok(ids)
    }
}
