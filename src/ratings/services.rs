use std::sync::Arc;

use futures::future::try_join_all;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::MOVIE_RATINGS_ACTIVE_MOVIE_USER_IDX;
use crate::error::{AppError, AppResult};
use crate::movies::repo::MovieRepository;
use crate::pagination::{Pagination, MAX_LIMIT};
use crate::ratings::commands::{CreateRatingCommand, SearchRatingsCommand, UpdateRatingCommand};
use crate::ratings::repo::MovieRatingRepository;
use crate::ratings::repo_types::{MovieRating, RatingFilter};
use crate::ratings::stats::{
    movie_statistics, user_statistics, MovieRatingStatistics, TopRatedMovie, UserRatingStatistics,
};

pub struct ManageMovieRatingService {
    ratings: Arc<dyn MovieRatingRepository>,
    movies: Arc<dyn MovieRepository>,
}

impl ManageMovieRatingService {
    pub fn new(ratings: Arc<dyn MovieRatingRepository>, movies: Arc<dyn MovieRepository>) -> Self {
        Self { ratings, movies }
    }

    async fn load(&self, rating_id: Uuid) -> AppResult<MovieRating> {
        self.ratings
            .find_by_id(rating_id)
            .await?
            .ok_or(AppError::RatingNotFound(rating_id))
    }

    fn authorize(rating: &MovieRating, user_id: Uuid, operation: &'static str) -> AppResult<()> {
        if rating.is_owned_by(user_id) {
            return Ok(());
        }
        warn!(rating_id = %rating.id, %user_id, operation, "not the rating author");
        Err(AppError::unauthorized(rating.id, user_id, operation))
    }

    #[instrument(skip(self, cmd), fields(movie_id = %cmd.movie_id, user_id = %cmd.user_id))]
    pub async fn create_rating(&self, cmd: CreateRatingCommand) -> AppResult<MovieRating> {
        match self.movies.find_by_id(cmd.movie_id).await? {
            Some(movie) if movie.is_active() => {}
            _ => return Err(AppError::MovieNotFound(cmd.movie_id)),
        }
        let duplicate = || AppError::DuplicateRating {
            movie_id: cmd.movie_id,
            user_id: cmd.user_id,
        };
        if self
            .ratings
            .exists_active_by_movie_and_user(cmd.movie_id, cmd.user_id)
            .await?
        {
            warn!("movie already rated by user");
            return Err(duplicate());
        }

        let rating = MovieRating::new(
            cmd.movie_id,
            cmd.user_id,
            cmd.rating,
            cmd.review.clone(),
            OffsetDateTime::now_utc(),
        );
        let saved = self.ratings.insert(&rating).await.map_err(|e| {
            AppError::from_write(e, |c| (c == MOVIE_RATINGS_ACTIVE_MOVIE_USER_IDX).then(duplicate))
        })?;
        info!(rating_id = %saved.id, rating = saved.rating, "rating created");
        Ok(saved)
    }

    /// Active ratings only.
    pub async fn get_rating(&self, rating_id: Uuid) -> AppResult<MovieRating> {
        let rating = self.load(rating_id).await?;
        if !rating.is_active() {
            return Err(AppError::RatingNotFound(rating_id));
        }
        Ok(rating)
    }

    #[instrument(skip(self, cmd), fields(rating_id = %cmd.rating_id, user_id = %cmd.user_id))]
    pub async fn update_rating(&self, cmd: UpdateRatingCommand) -> AppResult<MovieRating> {
        let rating = self.get_rating(cmd.rating_id).await?;
        Self::authorize(&rating, cmd.user_id, "update")?;
        let updated = rating.with_changes(cmd.rating, cmd.review, OffsetDateTime::now_utc());
        let saved = self.ratings.update(&updated).await?;
        info!(rating_id = %saved.id, "rating updated");
        Ok(saved)
    }

    /// Soft delete; no-op when already removed.
    #[instrument(skip(self))]
    pub async fn delete_rating(&self, rating_id: Uuid, user_id: Uuid) -> AppResult<MovieRating> {
        let rating = self.load(rating_id).await?;
        Self::authorize(&rating, user_id, "delete")?;
        if !rating.is_active() {
            return Ok(rating);
        }
        let saved = self
            .ratings
            .update(&rating.deactivated(user_id, OffsetDateTime::now_utc()))
            .await?;
        info!(%rating_id, "rating deleted");
        Ok(saved)
    }

    pub async fn get_movie_ratings(&self, movie_id: Uuid, page: Pagination) -> AppResult<Vec<MovieRating>> {
        self.find(RatingFilter {
            movie_id: Some(movie_id),
            page,
            ..Default::default()
        })
        .await
    }

    pub async fn get_user_ratings(&self, user_id: Uuid, page: Pagination) -> AppResult<Vec<MovieRating>> {
        self.find(RatingFilter {
            user_id: Some(user_id),
            page,
            ..Default::default()
        })
        .await
    }

    pub async fn search_ratings(&self, cmd: SearchRatingsCommand) -> AppResult<Vec<MovieRating>> {
        self.find(cmd.into_filter()).await
    }

    async fn find(&self, mut filter: RatingFilter) -> AppResult<Vec<MovieRating>> {
        filter.page = filter.page.clamped();
        Ok(self.ratings.search(&filter).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_movie_rating_statistics(&self, movie_id: Uuid) -> AppResult<MovieRatingStatistics> {
        let (total, average, ratings) = tokio::try_join!(
            self.ratings.count_active_by_movie(movie_id),
            self.ratings.average_by_movie(movie_id),
            self.ratings.find_all_active_by_movie(movie_id),
        )?;
        Ok(movie_statistics(movie_id, total, average, &ratings))
    }

    #[instrument(skip(self))]
    pub async fn get_user_rating_statistics(&self, user_id: Uuid) -> AppResult<UserRatingStatistics> {
        let ratings = self.ratings.find_all_active_by_user(user_id).await?;
        Ok(user_statistics(user_id, &ratings))
    }

    /// Best average first; per-movie aggregates are fetched concurrently.
    #[instrument(skip(self))]
    pub async fn get_top_rated_movies(
        &self,
        limit: i64,
        min_rating_count: i64,
    ) -> AppResult<Vec<TopRatedMovie>> {
        let ids = self
            .ratings
            .top_rated_movie_ids(limit.clamp(1, MAX_LIMIT), min_rating_count.max(1))
            .await?;
        let top = try_join_all(ids.into_iter().map(|movie_id| async move {
            let (average, count) = tokio::try_join!(
                self.ratings.average_by_movie(movie_id),
                self.ratings.count_active_by_movie(movie_id),
            )?;
            Ok::<_, anyhow::Error>(TopRatedMovie {
                movie_id,
                average_rating: average.unwrap_or(0.0),
                rating_count: count,
            })
        }))
        .await?;
        Ok(top)
    }

    pub async fn has_user_rated_movie(&self, movie_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        Ok(self
            .ratings
            .exists_active_by_movie_and_user(movie_id, user_id)
            .await?)
    }

    /// False when the rating does not exist or is no longer active.
    pub async fn can_user_modify_rating(&self, rating_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        Ok(self
            .ratings
            .find_by_id(rating_id)
            .await?
            .is_some_and(|r| r.is_active() && r.is_owned_by(user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movies::commands::CreateMovieCommand;
    use crate::movies::repo_types::Movie;
    use crate::movies::services::ManageMovieService;
    use crate::testing::InMemoryStore;

    struct Fixture {
        movies: ManageMovieService,
        ratings: ManageMovieRatingService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::default());
        Fixture {
            movies: ManageMovieService::new(store.clone()),
            ratings: ManageMovieRatingService::new(store.clone(), store),
        }
    }

    async fn movie(f: &Fixture, title: &str) -> Movie {
        let cmd = CreateMovieCommand::new(title, "plot", 2010, Uuid::new_v4()).unwrap();
        f.movies.create_movie(cmd).await.unwrap()
    }

    async fn rate(f: &Fixture, movie_id: Uuid, user_id: Uuid, value: i16) -> AppResult<MovieRating> {
        let cmd = CreateRatingCommand::new(movie_id, user_id, value, Some("review")).unwrap();
        f.ratings.create_rating(cmd).await
    }

    #[tokio::test]
    async fn rate_duplicate_delete_and_rate_again() {
        let f = fixture();
        let m = movie(&f, "Inception").await;
        let u1 = Uuid::new_v4();

        let first = rate(&f, m.id, u1, 8).await.unwrap();
        let err = rate(&f, m.id, u1, 9).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateRating { .. }));

        f.ratings.delete_rating(first.id, u1).await.unwrap();
        rate(&f, m.id, u1, 6).await.unwrap();

        let stats = f.ratings.get_movie_rating_statistics(m.id).await.unwrap();
        assert_eq!(stats.total_ratings, 1);
        assert!((stats.average_rating - 6.0).abs() < 1e-9);
        assert_eq!(stats.distribution[&6], 1);
    }

    #[tokio::test]
    async fn rating_requires_an_active_movie() {
        let f = fixture();
        let err = rate(&f, Uuid::new_v4(), Uuid::new_v4(), 5).await.unwrap_err();
        assert!(matches!(err, AppError::MovieNotFound(_)));

        let m = movie(&f, "Gone").await;
        f.movies.delete_movie(m.id, m.created_by).await.unwrap();
        let err = rate(&f, m.id, Uuid::new_v4(), 5).await.unwrap_err();
        assert!(matches!(err, AppError::MovieNotFound(_)));
    }

    #[tokio::test]
    async fn only_author_may_update_or_delete() {
        let f = fixture();
        let m = movie(&f, "Alien").await;
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
        let r = rate(&f, m.id, u1, 7).await.unwrap();

        let cmd = UpdateRatingCommand::new(r.id, u2, Some(1), None).unwrap();
        assert!(matches!(
            f.ratings.update_rating(cmd).await.unwrap_err(),
            AppError::UnauthorizedMovieOperation { operation: "update", .. }
        ));
        assert!(matches!(
            f.ratings.delete_rating(r.id, u2).await.unwrap_err(),
            AppError::UnauthorizedMovieOperation { operation: "delete", .. }
        ));
        assert_eq!(f.ratings.get_rating(r.id).await.unwrap(), r);

        let cmd = UpdateRatingCommand::new(r.id, u1, None, Some("Changed my mind")).unwrap();
        let updated = f.ratings.update_rating(cmd).await.unwrap();
        assert_eq!(updated.rating, 7);
        assert_eq!(updated.review.as_deref(), Some("Changed my mind"));

        let cmd = UpdateRatingCommand::new(r.id, u1, Some(8), Some("")).unwrap();
        let cleared = f.ratings.update_rating(cmd).await.unwrap();
        assert_eq!(cleared.rating, 8);
        assert!(cleared.review.is_none());

        assert!(f.ratings.can_user_modify_rating(r.id, u1).await.unwrap());
        assert!(!f.ratings.can_user_modify_rating(r.id, u2).await.unwrap());
        assert!(!f.ratings.can_user_modify_rating(Uuid::new_v4(), u1).await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_hides_the_rating() {
        let f = fixture();
        let m = movie(&f, "Alien").await;
        let u1 = Uuid::new_v4();
        let r = rate(&f, m.id, u1, 7).await.unwrap();

        let gone = f.ratings.delete_rating(r.id, u1).await.unwrap();
        let again = f.ratings.delete_rating(r.id, u1).await.unwrap();
        assert_eq!(gone.updated_at, again.updated_at);
        assert_eq!(gone.lifecycle, again.lifecycle);

        assert!(matches!(
            f.ratings.get_rating(r.id).await.unwrap_err(),
            AppError::RatingNotFound(_)
        ));
        assert!(!f.ratings.has_user_rated_movie(m.id, u1).await.unwrap());
        assert!(!f.ratings.can_user_modify_rating(r.id, u1).await.unwrap());
        let cmd = UpdateRatingCommand::new(r.id, u1, Some(3), None).unwrap();
        assert!(f.ratings.update_rating(cmd).await.is_err());
    }

    #[tokio::test]
    async fn statistics_for_unrated_movie_are_zero() {
        let f = fixture();
        let m = movie(&f, "Unseen").await;
        let stats = f.ratings.get_movie_rating_statistics(m.id).await.unwrap();
        assert_eq!(stats.total_ratings, 0);
        assert_eq!(stats.average_rating, 0.0);
        assert_eq!(stats.distribution.values().sum::<i64>(), 0);
    }

    #[tokio::test]
    async fn user_statistics_cover_active_ratings_only() {
        let f = fixture();
        let u1 = Uuid::new_v4();
        let a = movie(&f, "A").await;
        let b = movie(&f, "B").await;
        let c = movie(&f, "C").await;
        rate(&f, a.id, u1, 2).await.unwrap();
        rate(&f, b.id, u1, 9).await.unwrap();
        let dropped = rate(&f, c.id, u1, 10).await.unwrap();
        f.ratings.delete_rating(dropped.id, u1).await.unwrap();

        let stats = f.ratings.get_user_rating_statistics(u1).await.unwrap();
        assert_eq!(stats.total_ratings, 2);
        assert_eq!((stats.min_rating, stats.max_rating), (2, 9));
        assert!((stats.average_rating - 5.5).abs() < 1e-9);
        assert_eq!(stats.ratings_with_reviews, 2);
    }

    #[tokio::test]
    async fn top_rated_respects_threshold_and_order() {
        let f = fixture();
        let good = movie(&f, "Good").await;
        let great = movie(&f, "Great").await;
        let lonely = movie(&f, "Lonely").await;
        for v in [7, 8] {
            rate(&f, good.id, Uuid::new_v4(), v).await.unwrap();
        }
        for v in [9, 10] {
            rate(&f, great.id, Uuid::new_v4(), v).await.unwrap();
        }
        rate(&f, lonely.id, Uuid::new_v4(), 10).await.unwrap();

        let top = f.ratings.get_top_rated_movies(10, 2).await.unwrap();
        let ids: Vec<_> = top.iter().map(|t| t.movie_id).collect();
        assert_eq!(ids, [great.id, good.id]);
        assert!((top[0].average_rating - 9.5).abs() < 1e-9);
        assert_eq!(top[0].rating_count, 2);

        let top1 = f.ratings.get_top_rated_movies(1, 1).await.unwrap();
        assert_eq!(top1.len(), 1);
        assert_eq!(top1[0].movie_id, lonely.id);
    }

    #[tokio::test]
    async fn listing_and_search() {
        let f = fixture();
        let m = movie(&f, "Listing").await;
        let u1 = Uuid::new_v4();
        rate(&f, m.id, u1, 3).await.unwrap();
        let plain = CreateRatingCommand::new(m.id, Uuid::new_v4(), 9, None).unwrap();
        f.ratings.create_rating(plain).await.unwrap();

        let page = Pagination::default();
        assert_eq!(f.ratings.get_movie_ratings(m.id, page).await.unwrap().len(), 2);
        assert_eq!(f.ratings.get_user_ratings(u1, page).await.unwrap().len(), 1);
        assert!(f.ratings.has_user_rated_movie(m.id, u1).await.unwrap());

        let cmd = SearchRatingsCommand::new(Some(m.id), None, Some(5), None, Some(false), page).unwrap();
        let hits = f.ratings.search_ratings(cmd).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].rating, 9);
    }
}
