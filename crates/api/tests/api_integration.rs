//! API integration tests.
//!
//! These tests drive the router against mock databases.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use quickpoll_api::{middleware::AppState, router as api_router, PollStreams};
use quickpoll_core::{NoOpEventPublisher, PollService, TokenService, UserService};
use quickpoll_db::entities::{poll, user};
use quickpoll_db::repositories::{
    PollLikeRepository, PollOptionRepository, PollRepository, PollVoteRepository, UserRepository,
};
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
use std::sync::Arc;
use tower::ServiceExt;

fn empty_mock() -> Arc<DatabaseConnection> {
    Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
}

fn test_user(id: &str, username: &str) -> user::Model {
    user::Model {
        id: id.to_string(),
        username: username.to_string(),
        username_lower: username.to_lowercase(),
        email: format!("{username}@example.com"),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$invalid$invalid".to_string(),
        is_active: true,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

/// Create test app state with the given mock connections.
fn create_state(user_db: Arc<DatabaseConnection>, poll_db: Arc<DatabaseConnection>) -> AppState {
    let user_repo = UserRepository::new(user_db);
    let poll_streams = PollStreams::new();

    let poll_service = PollService::new(
        PollRepository::new(poll_db),
        PollOptionRepository::new(empty_mock()),
        PollVoteRepository::new(empty_mock()),
        PollLikeRepository::new(empty_mock()),
        user_repo.clone(),
        Arc::new(NoOpEventPublisher),
    );

    AppState {
        user_service: UserService::new(user_repo),
        poll_service,
        token_service: TokenService::new("test-secret-key", 30),
        poll_streams,
    }
}

fn build_app(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            quickpoll_api::middleware::auth_middleware,
        ))
        .with_state(state)
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_vote_requires_authentication() {
    let app = build_app(create_state(empty_mock(), empty_mock()));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/polls/p1/vote",
            r#"{"option_id":"o1"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_poll_requires_authentication() {
    let app = build_app(create_state(empty_mock(), empty_mock()));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/polls/",
            r#"{"title":"Favorite color?","options":[{"text":"Red"},{"text":"Blue"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_like_requires_authentication() {
    let app = build_app(create_state(empty_mock(), empty_mock()));

    let response = app
        .oneshot(json_request("POST", "/api/polls/p1/like", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let app = build_app(create_state(empty_mock(), empty_mock()));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            r#"{"username":"alice","email":"alice@example.com","password":"short"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_rejects_taken_username() {
    let user_db = Arc::new(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_user("u1", "alice")]])
            .into_connection(),
    );
    let app = build_app(create_state(user_db, empty_mock()));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            r#"{"username":"alice","email":"new@example.com","password":"password123"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_unknown_user_rejected() {
    let user_db = Arc::new(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection(),
    );
    let app = build_app(create_state(user_db, empty_mock()));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            r#"{"username":"nobody","password":"password123"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_unknown_poll_is_not_found() {
    let poll_db = Arc::new(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<poll::Model>::new()])
            .into_connection(),
    );
    let app = build_app(create_state(empty_mock(), poll_db));

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/polls/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_me_requires_authentication() {
    let app = build_app(create_state(empty_mock(), empty_mock()));

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
