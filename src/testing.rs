//! In-memory port doubles for service and router tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::password::PasswordEncoder;
use crate::auth::repo::JwtTokenRepository;
use crate::auth::repo_types::{JwtToken, Revocation};
use crate::db::{
    UniqueViolation, JWT_TOKENS_TOKEN_HASH_KEY, MOVIES_ACTIVE_TITLE_YEAR_IDX,
    MOVIE_RATINGS_ACTIVE_MOVIE_USER_IDX, USERS_EMAIL_KEY, USERS_USERNAME_KEY,
};
use crate::movies::repo::MovieRepository;
use crate::movies::repo_types::{Movie, MovieFilter};
use crate::pagination::Pagination;
use crate::ratings::repo::MovieRatingRepository;
use crate::ratings::repo_types::{MovieRating, RatingFilter};
use crate::users::repo::UserRepository;
use crate::users::repo_types::User;

/// Implements every repository port over hash maps and enforces the same
/// unique constraints as the migrations.
#[derive(Default)]
pub struct InMemoryStore {
    users: Mutex<HashMap<Uuid, User>>,
    movies: Mutex<HashMap<Uuid, Movie>>,
    ratings: Mutex<HashMap<Uuid, MovieRating>>,
    tokens: Mutex<HashMap<String, JwtToken>>,
}

fn paged<T>(items: Vec<T>, page: Pagination) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

impl InMemoryStore {
    pub fn find_token(&self, token_hash: &str) -> Option<JwtToken> {
        self.tokens.lock().unwrap().get(token_hash).cloned()
    }

    pub fn put_token(&self, token: JwtToken) {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.token_hash.clone(), token);
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn active_tokens_for(&self, user_id: Uuid) -> usize {
        self.tokens
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.user_id == user_id && !t.is_revoked())
            .count()
    }

    fn check_user_unique(users: &HashMap<Uuid, User>, user: &User) -> anyhow::Result<()> {
        for other in users.values().filter(|u| u.id != user.id) {
            if other.username == user.username {
                return Err(UniqueViolation::new(USERS_USERNAME_KEY).into());
            }
            if other.email == user.email {
                return Err(UniqueViolation::new(USERS_EMAIL_KEY).into());
            }
        }
        Ok(())
    }

    fn check_movie_unique(movies: &HashMap<Uuid, Movie>, movie: &Movie) -> anyhow::Result<()> {
        if !movie.is_active() {
            return Ok(());
        }
        let clash = movies.values().any(|m| {
            m.id != movie.id
                && m.is_active()
                && m.title == movie.title
                && m.year_of_release == movie.year_of_release
        });
        if clash {
            return Err(UniqueViolation::new(MOVIES_ACTIVE_TITLE_YEAR_IDX).into());
        }
        Ok(())
    }

    fn check_rating_unique(
        ratings: &HashMap<Uuid, MovieRating>,
        rating: &MovieRating,
    ) -> anyhow::Result<()> {
        if !rating.is_active() {
            return Ok(());
        }
        let clash = ratings.values().any(|r| {
            r.id != rating.id
                && r.is_active()
                && r.movie_id == rating.movie_id
                && r.user_id == rating.user_id
        });
        if clash {
            return Err(UniqueViolation::new(MOVIE_RATINGS_ACTIVE_MOVIE_USER_IDX).into());
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn exists_by_username(&self, username: &str) -> anyhow::Result<bool> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    async fn exists_by_email(&self, email: &str) -> anyhow::Result<bool> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn insert(&self, user: &User) -> anyhow::Result<User> {
        let mut users = self.users.lock().unwrap();
        Self::check_user_unique(&users, user)?;
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn update(&self, user: &User) -> anyhow::Result<User> {
        let mut users = self.users.lock().unwrap();
        anyhow::ensure!(users.contains_key(&user.id), "user {} not stored", user.id);
        Self::check_user_unique(&users, user)?;
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_all_active(&self, page: Pagination) -> anyhow::Result<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.is_active())
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(paged(users, page))
    }

    async fn search_by_username(&self, pattern: &str, page: Pagination) -> anyhow::Result<Vec<User>> {
        let needle = pattern.to_lowercase();
        let mut users: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.is_active() && u.username.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(paged(users, page))
    }
}

#[async_trait]
impl MovieRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Movie>> {
        Ok(self.movies.lock().unwrap().get(&id).cloned())
    }

    async fn exists_active_by_title_and_year(
        &self,
        title: &str,
        year_of_release: i32,
        exclude: Option<Uuid>,
    ) -> anyhow::Result<bool> {
        Ok(self.movies.lock().unwrap().values().any(|m| {
            m.is_active()
                && m.title == title
                && m.year_of_release == year_of_release
                && Some(m.id) != exclude
        }))
    }

    async fn insert(&self, movie: &Movie) -> anyhow::Result<Movie> {
        let mut movies = self.movies.lock().unwrap();
        Self::check_movie_unique(&movies, movie)?;
        movies.insert(movie.id, movie.clone());
        Ok(movie.clone())
    }

    async fn update(&self, movie: &Movie) -> anyhow::Result<Movie> {
        let mut movies = self.movies.lock().unwrap();
        anyhow::ensure!(movies.contains_key(&movie.id), "movie {} not stored", movie.id);
        Self::check_movie_unique(&movies, movie)?;
        movies.insert(movie.id, movie.clone());
        Ok(movie.clone())
    }

    async fn search(&self, filter: &MovieFilter) -> anyhow::Result<Vec<Movie>> {
        let mut movies: Vec<Movie> = self
            .movies
            .lock()
            .unwrap()
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        movies.sort_by(|a, b| {
            b.year_of_release
                .cmp(&a.year_of_release)
                .then_with(|| a.title.cmp(&b.title))
        });
        Ok(paged(movies, filter.page))
    }

    async fn count_by_creator(&self, user_id: Uuid) -> anyhow::Result<i64> {
        Ok(self
            .movies
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.created_by == user_id)
            .count() as i64)
    }

    async fn count_active_by_creator(&self, user_id: Uuid) -> anyhow::Result<i64> {
        Ok(self
            .movies
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.created_by == user_id && m.is_active())
            .count() as i64)
    }
}

impl InMemoryStore {
    fn active_ratings_where(&self, pred: impl Fn(&MovieRating) -> bool) -> Vec<MovieRating> {
        let mut ratings: Vec<MovieRating> = self
            .ratings
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.is_active() && pred(r))
            .cloned()
            .collect();
        ratings.sort_by_key(|r| r.created_at);
        ratings
    }
}

#[async_trait]
impl MovieRatingRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<MovieRating>> {
        Ok(self.ratings.lock().unwrap().get(&id).cloned())
    }

    async fn exists_active_by_movie_and_user(&self, movie_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        Ok(!self
            .active_ratings_where(|r| r.movie_id == movie_id && r.user_id == user_id)
            .is_empty())
    }

    async fn insert(&self, rating: &MovieRating) -> anyhow::Result<MovieRating> {
        let mut ratings = self.ratings.lock().unwrap();
        Self::check_rating_unique(&ratings, rating)?;
        ratings.insert(rating.id, rating.clone());
        Ok(rating.clone())
    }

    async fn update(&self, rating: &MovieRating) -> anyhow::Result<MovieRating> {
        let mut ratings = self.ratings.lock().unwrap();
        anyhow::ensure!(ratings.contains_key(&rating.id), "rating {} not stored", rating.id);
        Self::check_rating_unique(&ratings, rating)?;
        ratings.insert(rating.id, rating.clone());
        Ok(rating.clone())
    }

    async fn count_active_by_movie(&self, movie_id: Uuid) -> anyhow::Result<i64> {
        Ok(self.active_ratings_where(|r| r.movie_id == movie_id).len() as i64)
    }

    async fn average_by_movie(&self, movie_id: Uuid) -> anyhow::Result<Option<f64>> {
        let ratings = self.active_ratings_where(|r| r.movie_id == movie_id);
        if ratings.is_empty() {
            return Ok(None);
        }
        let sum: i64 = ratings.iter().map(|r| i64::from(r.rating)).sum();
        Ok(Some(sum as f64 / ratings.len() as f64))
    }

    async fn find_all_active_by_movie(&self, movie_id: Uuid) -> anyhow::Result<Vec<MovieRating>> {
        Ok(self.active_ratings_where(|r| r.movie_id == movie_id))
    }

    async fn find_all_active_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<MovieRating>> {
        Ok(self.active_ratings_where(|r| r.user_id == user_id))
    }

    async fn search(&self, filter: &RatingFilter) -> anyhow::Result<Vec<MovieRating>> {
        let mut ratings = self.active_ratings_where(|r| filter.matches(r));
        ratings.reverse();
        Ok(paged(ratings, filter.page))
    }

    async fn top_rated_movie_ids(&self, limit: i64, min_rating_count: i64) -> anyhow::Result<Vec<Uuid>> {
        let active_movies: Vec<Uuid> = self
            .movies
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.is_active())
            .map(|m| m.id)
            .collect();
        let mut ranked: Vec<(Uuid, f64, i64)> = Vec::new();
        for movie_id in active_movies {
            let ratings = self.active_ratings_where(|r| r.movie_id == movie_id);
            let count = ratings.len() as i64;
            if count == 0 || count < min_rating_count {
                continue;
            }
            let sum: i64 = ratings.iter().map(|r| i64::from(r.rating)).sum();
            ranked.push((movie_id, sum as f64 / count as f64, count));
        }
        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| b.2.cmp(&a.2))
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(ranked
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(id, _, _)| id)
            .collect())
    }
}

#[async_trait]
impl JwtTokenRepository for InMemoryStore {
    async fn insert(&self, token: &JwtToken) -> anyhow::Result<()> {
        let mut tokens = self.tokens.lock().unwrap();
        if tokens.contains_key(&token.token_hash) {
            return Err(UniqueViolation::new(JWT_TOKENS_TOKEN_HASH_KEY).into());
        }
        tokens.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> anyhow::Result<Option<JwtToken>> {
        Ok(self.find_token(token_hash))
    }

    async fn revoke(&self, token_hash: &str, reason: &str, at: OffsetDateTime) -> anyhow::Result<bool> {
        let mut tokens = self.tokens.lock().unwrap();
        match tokens.get_mut(token_hash) {
            Some(token) if !token.is_revoked() => {
                token.revocation = Some(Revocation {
                    at,
                    reason: reason.to_string(),
                });
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        reason: &str,
        at: OffsetDateTime,
    ) -> anyhow::Result<u64> {
        let mut tokens = self.tokens.lock().unwrap();
        let mut count = 0;
        for token in tokens.values_mut() {
            if token.user_id == user_id && !token.is_revoked() && !token.is_expired(at) {
                token.revocation = Some(Revocation {
                    at,
                    reason: reason.to_string(),
                });
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_expired_before(&self, cutoff: OffsetDateTime) -> anyhow::Result<u64> {
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at >= cutoff);
        Ok((before - tokens.len()) as u64)
    }
}

/// Stores passwords as `plain:<password>` so tests skip Argon2's cost.
#[derive(Debug, Default, Clone)]
pub struct PlainPasswordEncoder;

#[async_trait]
impl PasswordEncoder for PlainPasswordEncoder {
    async fn hash(&self, plain: &str) -> anyhow::Result<String> {
        Ok(format!("plain:{plain}"))
    }

    async fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        Ok(hash.strip_prefix("plain:") == Some(plain))
    }
}

/// Every call errors, for exercising fail-closed paths.
#[derive(Debug, Default, Clone)]
pub struct FailingPasswordEncoder;

#[async_trait]
impl PasswordEncoder for FailingPasswordEncoder {
    async fn hash(&self, _plain: &str) -> anyhow::Result<String> {
        anyhow::bail!("hasher unavailable")
    }

    async fn verify(&self, _plain: &str, _hash: &str) -> anyhow::Result<bool> {
        anyhow::bail!("hasher unavailable")
    }
}
