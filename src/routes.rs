// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{attempt, auth, leaderboard, quiz},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, quizzes, attempts).
/// * Teacher-only endpoints sit behind the Bearer token middleware; students never authenticate.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = [
        state.config.public_base_url.trim_end_matches('/'),
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ]
    .iter()
    .filter_map(|origin| HeaderValue::from_str(origin).ok())
    .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let require_teacher = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let quiz_routes = Router::new()
        .route(
            "/",
            get(quiz::list_quizzes)
                .post(quiz::create_quiz)
                .route_layer(require_teacher.clone()),
        )
        .route(
            "/stats",
            get(quiz::teacher_stats).route_layer(require_teacher.clone()),
        )
        .route(
            "/{id}",
            get(quiz::get_quiz).merge(
                put(quiz::update_quiz)
                    .delete(quiz::delete_quiz)
                    .route_layer(require_teacher),
            ),
        )
        .route("/{id}/share", get(quiz::share_link))
        .route("/{id}/attempts", post(attempt::start_attempt))
        .route("/{id}/leaderboard", get(leaderboard::get_leaderboard));

    let attempt_routes = Router::new()
        .route("/{id}", get(attempt::get_attempt).delete(attempt::abandon))
        .route("/{id}/answer", post(attempt::select_answer))
        .route("/{id}/advance", post(attempt::advance));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/attempts", attempt_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{body::Body, http::Request, http::StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(AppState::in_memory(Config {
            database_url: None,
            jwt_secret: "router_secret".into(),
            jwt_expiration: 60,
            rust_log: "error".into(),
            public_base_url: "https://quiz.example.edu".into(),
            bind_addr: "127.0.0.1:0".into(),
            attempt_tick: Duration::from_secs(1),
            attempt_idle: Duration::from_secs(120),
            attempt_retain: Duration::from_secs(600),
            leaderboard_refresh: Duration::from_secs(5),
            leaderboard_idle: Duration::from_secs(30),
        }))
    }

    #[tokio::test]
    async fn quiz_listing_requires_bearer_token() {
        let resp = app()
            .oneshot(Request::get("/api/quizzes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn public_quiz_lookup_needs_no_token() {
        let resp = app()
            .oneshot(Request::get("/api/quizzes/41").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn preflight_allows_public_origin() {
        let resp = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/quizzes/1/attempts")
                    .header("origin", "https://quiz.example.edu")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "https://quiz.example.edu"
        );
    }
}
