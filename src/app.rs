use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::state::AppState;
use crate::{auth, movies, ratings, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(movies::router())
                .merge(ratings::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router, username: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "correct-horse",
                "first_name": "Test",
                "last_name": "User",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    fn app() -> Router {
        let (state, _store) = AppState::fake();
        build_app(state)
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = app();
        let res = app
            .clone()
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_then_read_profile() {
        let app = app();
        let token = register(&app, "alice").await;

        let (status, me) = send(&app, Method::GET, "/api/v1/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["username"], "alice");
        assert_eq!(me["email"], "alice@example.com");
        assert!(me.get("password_hash").is_none());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "username": "alice",
                "email": "other@example.com",
                "password": "correct-horse",
                "first_name": "A",
                "last_name": "B",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "USERNAME_ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn protected_routes_require_a_bearer_token() {
        let app = app();
        let (status, body) = send(&app, Method::GET, "/api/v1/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "INVALID_TOKEN");

        let (status, _) = send(&app, Method::GET, "/api/v1/me", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_revokes_the_access_token() {
        let app = app();
        let token = register(&app, "bob").await;
        let (status, _) = send(&app, Method::POST, "/api/v1/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::GET, "/api/v1/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn only_the_creator_may_edit_a_movie() {
        let app = app();
        let owner = register(&app, "owner").await;
        let other = register(&app, "other").await;

        let (status, movie) = send(
            &app,
            Method::POST,
            "/api/v1/movies",
            Some(&owner),
            Some(json!({ "title": "Heat", "plot": "Cops and robbers.", "year_of_release": 1995 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(movie["state"], "active");
        let uri = format!("/api/v1/movies/{}", movie["id"].as_str().unwrap());

        let (status, body) = send(&app, Method::PUT, &uri, Some(&other), Some(json!({ "title": "Mine" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "UNAUTHORIZED_OPERATION");

        let (status, body) = send(&app, Method::PUT, &uri, Some(&owner), Some(json!({ "plot": "LA crime." }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["plot"], "LA crime.");
        assert_eq!(body["title"], "Heat");

        let (status, _) = send(&app, Method::DELETE, &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rating_flow_updates_statistics() {
        let app = app();
        let token = register(&app, "critic").await;
        let (_, movie) = send(
            &app,
            Method::POST,
            "/api/v1/movies",
            Some(&token),
            Some(json!({ "title": "Alien", "plot": "In space.", "year_of_release": 1979 })),
        )
        .await;
        let movie_id = movie["id"].as_str().unwrap().to_string();
        let ratings_uri = format!("/api/v1/movies/{movie_id}/ratings");

        let (status, rating) = send(
            &app,
            Method::POST,
            &ratings_uri,
            Some(&token),
            Some(json!({ "rating": 9, "review": "Terrifying." })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, Method::POST, &ratings_uri, Some(&token), Some(json!({ "rating": 3 }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "DUPLICATE_RATING");

        let (status, body) = send(&app, Method::POST, &ratings_uri, Some(&token), Some(json!({ "rating": 11 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["rating"].is_string());

        let (_, mine) = send(&app, Method::GET, &format!("{ratings_uri}/mine"), Some(&token), None).await;
        assert_eq!(mine["rated"], true);

        let (status, stats) = send(&app, Method::GET, &format!("{ratings_uri}/stats"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total_ratings"], 1);
        assert_eq!(stats["ratings_with_reviews"], 1);

        let rating_uri = format!("/api/v1/ratings/{}", rating["id"].as_str().unwrap());
        let (status, _) = send(&app, Method::DELETE, &rating_uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, stats) = send(&app, Method::GET, &format!("{ratings_uri}/stats"), None, None).await;
        assert_eq!(stats["total_ratings"], 0);

        let (status, _) = send(&app, Method::POST, &ratings_uri, Some(&token), Some(json!({ "rating": 7 }))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn deactivated_account_can_be_reopened_by_its_owner() {
        let app = app();
        let token = register(&app, "dora").await;

        let wrong = json!({ "password": "not-my-password" });
        let (status, body) = send(&app, Method::POST, "/api/v1/me/deactivate", Some(&token), Some(wrong)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_PASSWORD");

        let right = json!({ "password": "correct-horse" });
        let (status, body) = send(&app, Method::POST, "/api/v1/me/deactivate", Some(&token), Some(right)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_active"], false);
        let (status, _) = send(&app, Method::GET, "/api/v1/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let creds = json!({ "username_or_email": "dora", "password": "correct-horse" });
        let (status, body) = send(&app, Method::POST, "/api/v1/auth/login", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "USER_ACCOUNT_INACTIVE");

        let bad = json!({ "username_or_email": "dora", "password": "guessing-game" });
        let (status, _) = send(&app, Method::POST, "/api/v1/auth/reactivate", None, Some(bad)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, Method::POST, "/api/v1/auth/reactivate", None, Some(creds)).await;
        assert_eq!(status, StatusCode::OK);
        let fresh = body["access_token"].as_str().unwrap().to_string();
        let (status, me) = send(&app, Method::GET, "/api/v1/me", Some(&fresh), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["is_active"], true);
    }

    #[tokio::test]
    async fn single_field_movie_queries() {
        let app = app();
        let token = register(&app, "curator").await;
        let (_, me) = send(&app, Method::GET, "/api/v1/me", Some(&token), None).await;
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/movies",
            Some(&token),
            Some(json!({ "title": "Heat", "plot": "A crew of thieves.", "year_of_release": 1995 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        for uri in [
            "/api/v1/movies/by-title?q=hea".to_string(),
            "/api/v1/movies/by-plot?q=THIEVES".to_string(),
            "/api/v1/movies/by-year/1995".to_string(),
            "/api/v1/movies/by-years?from=1990&to=2000".to_string(),
            format!("/api/v1/users/{}/movies", me["id"].as_str().unwrap()),
        ] {
            let (status, body) = send(&app, Method::GET, &uri, None, None).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(body.as_array().unwrap().len(), 1, "{uri}");
        }

        let (status, _) = send(&app, Method::GET, "/api/v1/movies/by-title", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, Method::GET, "/api/v1/movies/by-years?from=2000&to=1990", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, body) = send(&app, Method::GET, "/api/v1/movies/by-year/1996", None, None).await;
        assert!(body.as_array().unwrap().is_empty());
    }
}
