use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        commands::AuthenticationCommand,
        dto::{
            AuthResponse, AvailabilityQuery, AvailabilityResponse, LoginRequest, LogoutRequest,
            RefreshRequest, RegisterRequest,
        },
        extractors::AuthUser,
    },
    error::{AppError, AppResult},
    state::AppState,
    users::commands::RegisterUserCommand,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/reactivate", post(reactivate))
        .route("/auth/username-available", get(username_available))
        .route("/auth/email-available", get(email_available))
}

/// Unknown accounts look the same as bad passwords to the caller.
fn hide_unknown_account(err: AppError) -> AppError {
    match err {
        AppError::UserNotFound(_) => AppError::AuthenticationFailed,
        other => other,
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let cmd = RegisterUserCommand::new(
        &payload.username,
        &payload.email,
        &payload.password,
        &payload.first_name,
        &payload.last_name,
    )?;
    let login = AuthenticationCommand::new(&cmd.username, &payload.password)?;
    let user = state.register.register_user(cmd).await?;
    let session = state.auth.login(login).await?;
    info!(user_id = %user.id, "registered and logged in");
    Ok((StatusCode::CREATED, Json(session.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let cmd = AuthenticationCommand::new(&payload.username_or_email, &payload.password)?;
    let session = state.auth.login(cmd).await.map_err(hide_unknown_account)?;
    Ok(Json(session.into()))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let session = state.auth.refresh_session(&payload.refresh_token).await?;
    Ok(Json(session.into()))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Option<Json<LogoutRequest>>,
) -> AppResult<StatusCode> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    state
        .auth
        .logout(user.id, &user.token, payload.refresh_token.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reopens a deactivated account for its owner and signs them in.
#[instrument(skip(state, payload))]
pub async fn reactivate(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let cmd = AuthenticationCommand::new(&payload.username_or_email, &payload.password)?;
    let owner = state
        .auth
        .verify_account_owner(&cmd)
        .await
        .map_err(hide_unknown_account)?;
    state.profiles.reactivate_user(owner.id).await?;
    let session = state.auth.login(cmd).await?;
    Ok(Json(session.into()))
}

pub async fn username_available(
    State(state): State<AppState>,
    Query(q): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    let available = state.register.is_username_available(q.username.as_deref()).await?;
    Ok(Json(AvailabilityResponse { available }))
}

pub async fn email_available(
    State(state): State<AppState>,
    Query(q): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    let available = state.register.is_email_available(q.email.as_deref()).await?;
    Ok(Json(AvailabilityResponse { available }))
}
