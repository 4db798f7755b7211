use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::AppResult,
    pagination::PageQuery,
    ratings::{
        commands::{CreateRatingCommand, UpdateRatingCommand},
        dto::{
            CanModifyResponse, RateMovieRequest, RatedResponse, RatingResponse,
            SearchRatingsQuery, TopRatedQuery, UpdateRatingRequest,
        },
        stats::{MovieRatingStatistics, TopRatedMovie, UserRatingStatistics},
    },
    state::AppState,
};

pub fn movie_rating_routes() -> Router<AppState> {
    Router::new()
        .route("/movies/:id/ratings", get(movie_ratings).post(rate_movie))
        .route("/movies/:id/ratings/stats", get(movie_rating_statistics))
        .route("/movies/:id/ratings/mine", get(has_rated_movie))
}

pub fn rating_routes() -> Router<AppState> {
    Router::new()
        .route("/ratings/top", get(top_rated_movies))
        .route("/ratings/search", get(search_ratings))
        .route(
            "/ratings/:id",
            get(get_rating).put(update_rating).delete(delete_rating),
        )
        .route("/ratings/:id/can-modify", get(can_modify_rating))
        .route("/me/ratings", get(my_ratings))
        .route("/me/ratings/stats", get(my_rating_statistics))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn rate_movie(
    State(state): State<AppState>,
    user: AuthUser,
    Path(movie_id): Path<Uuid>,
    Json(body): Json<RateMovieRequest>,
) -> AppResult<(StatusCode, Json<RatingResponse>)> {
    let cmd = CreateRatingCommand::new(movie_id, user.id, body.rating, body.review.as_deref())?;
    let rating = state.ratings.create_rating(cmd).await?;
    Ok((StatusCode::CREATED, Json(rating.into())))
}

pub async fn movie_ratings(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
    Query(q): Query<PageQuery>,
) -> AppResult<Json<Vec<RatingResponse>>> {
    let ratings = state.ratings.get_movie_ratings(movie_id, q.page()).await?;
    Ok(Json(ratings.into_iter().map(RatingResponse::from).collect()))
}

pub async fn movie_rating_statistics(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> AppResult<Json<MovieRatingStatistics>> {
    Ok(Json(state.ratings.get_movie_rating_statistics(movie_id).await?))
}

pub async fn has_rated_movie(
    State(state): State<AppState>,
    user: AuthUser,
    Path(movie_id): Path<Uuid>,
) -> AppResult<Json<RatedResponse>> {
    let rated = state.ratings.has_user_rated_movie(movie_id, user.id).await?;
    Ok(Json(RatedResponse { rated }))
}

#[instrument(skip(state))]
pub async fn top_rated_movies(
    State(state): State<AppState>,
    Query(q): Query<TopRatedQuery>,
) -> AppResult<Json<Vec<TopRatedMovie>>> {
    let top = state
        .ratings
        .get_top_rated_movies(q.limit(), q.min_count())
        .await?;
    Ok(Json(top))
}

pub async fn search_ratings(
    State(state): State<AppState>,
    Query(q): Query<SearchRatingsQuery>,
) -> AppResult<Json<Vec<RatingResponse>>> {
    let ratings = state.ratings.search_ratings(q.into_command()?).await?;
    Ok(Json(ratings.into_iter().map(RatingResponse::from).collect()))
}

pub async fn get_rating(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RatingResponse>> {
    Ok(Json(state.ratings.get_rating(id).await?.into()))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_rating(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRatingRequest>,
) -> AppResult<Json<RatingResponse>> {
    let cmd = UpdateRatingCommand::new(id, user.id, body.rating, body.review.as_deref())?;
    Ok(Json(state.ratings.update_rating(cmd).await?.into()))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_rating(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.ratings.delete_rating(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn can_modify_rating(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CanModifyResponse>> {
    let can_modify = state.ratings.can_user_modify_rating(id, user.id).await?;
    Ok(Json(CanModifyResponse { can_modify }))
}

pub async fn my_ratings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<PageQuery>,
) -> AppResult<Json<Vec<RatingResponse>>> {
    let ratings = state.ratings.get_user_ratings(user.id, q.page()).await?;
    Ok(Json(ratings.into_iter().map(RatingResponse::from).collect()))
}

pub async fn my_rating_statistics(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<UserRatingStatistics>> {
    Ok(Json(state.ratings.get_user_rating_statistics(user.id).await?))
}
