use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::AppResult,
    movies::{
        commands::{CreateMovieCommand, UpdateMovieCommand},
        dto::{
            CreateMovieRequest, FragmentQuery, MovieResponse, SearchMoviesQuery, UpdateMovieRequest,
            YearRangeQuery,
        },
        repo_types::Movie,
        services::UserMovieStatistics,
    },
    pagination::{PageQuery, Pagination},
    state::AppState,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/movies", get(search_movies))
        .route("/movies/:id", get(get_movie))
        .route("/movies/by-title", get(movies_by_title))
        .route("/movies/by-plot", get(movies_by_plot))
        .route("/movies/by-year/:year", get(movies_by_year))
        .route("/movies/by-years", get(movies_by_year_range))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/movies", post(create_movie))
        .route("/movies/:id", axum::routing::put(update_movie).delete(delete_movie))
        .route("/movies/:id/deactivate", post(deactivate_movie))
        .route("/movies/:id/reactivate", post(reactivate_movie))
        .route("/me/movies/stats", get(my_movie_statistics))
}

// --- handlers ---

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_movie(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateMovieRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<MovieResponse>)> {
    let cmd = CreateMovieCommand::new(&body.title, &body.plot, body.year_of_release, user.id)?;
    let movie = state.movies.create_movie(cmd).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/movies/{}", movie.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(movie.into())))
}

pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MovieResponse>> {
    let movie = state.movies.get_movie(id).await?;
    Ok(Json(movie.into()))
}

#[instrument(skip(state))]
pub async fn search_movies(
    State(state): State<AppState>,
    Query(q): Query<SearchMoviesQuery>,
) -> AppResult<Json<Vec<MovieResponse>>> {
    Ok(respond(state.movies.search_movies(q.into_command()?).await?))
}

fn respond(movies: Vec<Movie>) -> Json<Vec<MovieResponse>> {
    Json(movies.into_iter().map(MovieResponse::from).collect())
}

pub async fn movies_by_title(
    State(state): State<AppState>,
    Query(q): Query<FragmentQuery>,
) -> AppResult<Json<Vec<MovieResponse>>> {
    Ok(respond(state.movies.search_movies_by_title(&q.q, q.page()).await?))
}

pub async fn movies_by_plot(
    State(state): State<AppState>,
    Query(q): Query<FragmentQuery>,
) -> AppResult<Json<Vec<MovieResponse>>> {
    Ok(respond(state.movies.search_movies_by_plot(&q.q, q.page()).await?))
}

pub async fn movies_by_year(
    State(state): State<AppState>,
    Path(year): Path<i32>,
    Query(q): Query<PageQuery>,
) -> AppResult<Json<Vec<MovieResponse>>> {
    Ok(respond(state.movies.get_movies_by_year(year, q.page()).await?))
}

pub async fn movies_by_year_range(
    State(state): State<AppState>,
    Query(q): Query<YearRangeQuery>,
) -> AppResult<Json<Vec<MovieResponse>>> {
    let page = Pagination::from_query(q.limit, q.offset);
    Ok(respond(state.movies.get_movies_by_year_range(q.from, q.to, page).await?))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_movie(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMovieRequest>,
) -> AppResult<Json<MovieResponse>> {
    let cmd = UpdateMovieCommand::new(
        id,
        user.id,
        body.title.as_deref(),
        body.plot.as_deref(),
        body.year_of_release,
    )?;
    let movie = state.movies.update_movie(cmd).await?;
    Ok(Json(movie.into()))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_movie(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.movies.delete_movie(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn deactivate_movie(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MovieResponse>> {
    let movie = state.movies.deactivate_movie(id, user.id).await?;
    Ok(Json(movie.into()))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn reactivate_movie(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MovieResponse>> {
    let movie = state.movies.reactivate_movie(id, user.id).await?;
    Ok(Json(movie.into()))
}

pub async fn my_movie_statistics(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<UserMovieStatistics>> {
    Ok(Json(state.movies.get_user_movie_statistics(user.id).await?))
}
