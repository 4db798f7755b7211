use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{
        extractors::AuthUser,
        jwt::{REASON_ACCOUNT_DEACTIVATED, REASON_PASSWORD_CHANGED},
    },
    error::{AppError, AppResult},
    movies::dto::MovieResponse,
    pagination::PageQuery,
    state::AppState,
    users::{
        commands::{ChangePasswordCommand, UpdateUserProfileCommand},
        dto::{ChangePasswordRequest, DeactivateRequest, PublicUser, SearchUsersQuery, UpdateProfileRequest, UserSummary},
    },
};

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).put(update_me))
        .route("/me/password", put(change_password))
        .route("/me/deactivate", post(deactivate_me))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/search", get(search_users))
        .route("/users/:id", get(get_user))
        .route("/users/:id/movies", get(movies_by_user))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_me(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<PublicUser>> {
    let me = state.profiles.get_user_profile(user.id).await?;
    Ok(Json(me.into()))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<PublicUser>> {
    let cmd = UpdateUserProfileCommand::new(
        payload.email.as_deref(),
        payload.first_name.as_deref(),
        payload.last_name.as_deref(),
    )?;
    let updated = state.profiles.update_user_profile(user.id, cmd).await?;
    Ok(Json(updated.into()))
}

/// Every session of the user is revoked after a password change.
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    let cmd = ChangePasswordCommand::new(&payload.current_password, &payload.new_password)?;
    state.profiles.change_password(user.id, cmd).await?;
    state
        .tokens
        .revoke_all_for_user(user.id, REASON_PASSWORD_CHANGED)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Requires the current password; every session of the user is revoked.
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn deactivate_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<DeactivateRequest>,
) -> AppResult<Json<PublicUser>> {
    if !state
        .auth
        .validate_credentials(&user.claims.username, &payload.password)
        .await
    {
        return Err(AppError::InvalidPassword);
    }
    let me = state.profiles.deactivate_user(user.id).await?;
    let revoked = state
        .tokens
        .revoke_all_for_user(user.id, REASON_ACCOUNT_DEACTIVATED)
        .await?;
    info!(revoked, "account deactivated");
    Ok(Json(me.into()))
}

pub async fn search_users(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(q): Query<SearchUsersQuery>,
) -> AppResult<Json<Vec<UserSummary>>> {
    let users = state
        .profiles
        .search_users_by_username(q.username.as_deref(), q.page())
        .await?;
    Ok(Json(users.into_iter().map(UserSummary::from).collect()))
}

/// Inactive accounts are reported as missing.
pub async fn get_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserSummary>> {
    let found = state.profiles.get_user_profile(id).await?;
    if !found.is_active() {
        return Err(AppError::UserNotFound(id.to_string()));
    }
    Ok(Json(found.into()))
}

pub async fn movies_by_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<PageQuery>,
) -> AppResult<Json<Vec<MovieResponse>>> {
    let movies = state.movies.get_movies_by_creator(id, q.page()).await?;
    Ok(Json(movies.into_iter().map(MovieResponse::from).collect()))
}
