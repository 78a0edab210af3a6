//! API Routes
//!
//! Configures the Axum router with all notification service endpoints.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    check_handler, create_post_handler, delete_post_handler, events_handler, health_handler,
    like_post_handler, newest_posts_handler, next_posts_handler, stats_handler,
    unlike_post_handler, AppState,
};
use crate::auth::require_auth;

/// Room for the JSON envelope around a maximum-size post.
const BODY_OVERHEAD: usize = 4 * 1024;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /api/events` - Live event stream (no token required)
/// - `GET /api/check` - Moderator flag of the caller
/// - `POST /api/sendPost` - Create a post
/// - `POST /api/deletePost` - Delete a post
/// - `POST /api/likePost`, `POST /api/unlikePost` - Toggle a like
/// - `GET /api/tenNewestPosts` - Newest page of posts
/// - `GET /api/getNextTenPosts/:postId` - Page older than a post
/// - `GET /stats` - Cache and subscriber statistics
/// - `GET /health` - Health check endpoint
///
/// Every `/api` route except `events` goes through [`require_auth`].
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let authenticated = Router::new()
        .route("/check", get(check_handler))
        .route("/sendPost", post(create_post_handler))
        .route("/deletePost", post(delete_post_handler))
        .route("/likePost", post(like_post_handler))
        .route("/unlikePost", post(unlike_post_handler))
        .route("/tenNewestPosts", get(newest_posts_handler))
        .route("/getNextTenPosts/:postId", get(next_posts_handler))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_auth,
        ));

    let api = Router::new()
        .route("/events", get(events_handler))
        .merge(authenticated);

    let body_limit = state.max_post_bytes.saturating_add(BODY_OVERHEAD);

    Router::new()
        .nest("/api", api)
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AUTH_TOKEN_HEADER;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tokio::sync::watch;
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, watch::Sender<bool>) {
        let config = Config {
            auth_tokens: "tok-ann:u1:ann@example.com:Ann,tok-spam:u9:spam@example.com:Spam"
                .to_string(),
            blacklisted_emails: vec!["spam@example.com".to_string()],
            ..Config::default()
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = AppState::from_config(&config, shutdown_rx);
        (create_router(state), shutdown_tx)
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTH_TOKEN_HEADER, token);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _shutdown) = create_test_app();

        let response = app.oneshot(get_request("/health", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let (app, _shutdown) = create_test_app();

        let response = app.oneshot(get_request("/stats", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let (app, _shutdown) = create_test_app();

        let response = app
            .oneshot(get_request("/api/tenNewestPosts", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthorized() {
        let (app, _shutdown) = create_test_app();

        let response = app
            .oneshot(get_request("/api/check", Some("nope")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_blacklisted_user_is_forbidden() {
        let (app, _shutdown) = create_test_app();

        let response = app
            .oneshot(get_request("/api/check", Some("tok-spam")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_send_post_endpoint() {
        let (app, _shutdown) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sendPost")
                    .header(AUTH_TOKEN_HEADER, "tok-ann")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"content":"hello everyone"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_events_endpoint_needs_no_token() {
        let (app, shutdown) = create_test_app();

        let response = app.oneshot(get_request("/api/events", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
        shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_post_not_found() {
        let (app, _shutdown) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/deletePost")
                    .header(AUTH_TOKEN_HEADER, "tok-ann")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"id":"missing"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
