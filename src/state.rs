use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::jwt::{JwtKeys, TokenService};
use crate::auth::password::{Argon2PasswordEncoder, PasswordEncoder};
use crate::auth::repo::{JwtTokenRepository, PgJwtTokenRepository};
use crate::auth::services::UserAuthenticationService;
use crate::config::AppConfig;
use crate::movies::repo::{MovieRepository, PgMovieRepository};
use crate::movies::services::ManageMovieService;
use crate::ratings::repo::{MovieRatingRepository, PgMovieRatingRepository};
use crate::ratings::services::ManageMovieRatingService;
use crate::users::repo::{PgUserRepository, UserRepository};
use crate::users::services::{ManageUserProfileService, RegisterUserService};

/// Ports the services are built from.
pub struct Ports {
    pub users: Arc<dyn UserRepository>,
    pub movies: Arc<dyn MovieRepository>,
    pub ratings: Arc<dyn MovieRatingRepository>,
    pub tokens: Arc<dyn JwtTokenRepository>,
    pub passwords: Arc<dyn PasswordEncoder>,
}

impl Ports {
    pub fn postgres(db: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(db.clone())),
            movies: Arc::new(PgMovieRepository::new(db.clone())),
            ratings: Arc::new(PgMovieRatingRepository::new(db.clone())),
            tokens: Arc::new(PgJwtTokenRepository::new(db)),
            passwords: Arc::new(Argon2PasswordEncoder),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub register: Arc<RegisterUserService>,
    pub auth: Arc<UserAuthenticationService>,
    pub profiles: Arc<ManageUserProfileService>,
    pub movies: Arc<ManageMovieService>,
    pub ratings: Arc<ManageMovieRatingService>,
}

impl AppState {
    pub fn from_parts(config: &AppConfig, ports: Ports) -> Self {
        let Ports {
            users,
            movies,
            ratings,
            tokens,
            passwords,
        } = ports;
        let tokens = Arc::new(TokenService::new(JwtKeys::from_config(&config.jwt), tokens));
        Self {
            register: Arc::new(RegisterUserService::new(users.clone(), passwords.clone())),
            auth: Arc::new(UserAuthenticationService::new(
                users.clone(),
                passwords.clone(),
                tokens.clone(),
            )),
            profiles: Arc::new(ManageUserProfileService::new(users, passwords)),
            movies: Arc::new(ManageMovieService::new(movies.clone())),
            ratings: Arc::new(ManageMovieRatingService::new(ratings, movies)),
            tokens,
        }
    }

    pub fn postgres(config: &AppConfig, db: PgPool) -> Self {
        Self::from_parts(config, Ports::postgres(db))
    }

    /// State over the in-memory store with plain-text passwords.
    #[cfg(test)]
    pub fn fake() -> (Self, Arc<crate::testing::InMemoryStore>) {
        use crate::testing::{InMemoryStore, PlainPasswordEncoder};

        let store = Arc::new(InMemoryStore::default());
        let ports = Ports {
            users: store.clone(),
            movies: store.clone(),
            ratings: store.clone(),
            tokens: store.clone(),
            passwords: Arc::new(PlainPasswordEncoder),
        };
        (Self::from_parts(&AppConfig::for_tests(), ports), store)
    }
}
