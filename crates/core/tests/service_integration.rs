//! Service integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test service_integration -- --ignored`
//!
//! Environment variables are the same as for the db crate's
//! integration tests (`TEST_DB_HOST`, `TEST_DB_PORT`, ...).

#![allow(clippy::unwrap_used)]

use quickpoll_core::{
    CreatePollInput, CreateUserInput, NoOpEventPublisher, PollService, UserService,
};
use quickpoll_db::repositories::{
    PollLikeRepository, PollOptionRepository, PollRepository, PollVoteRepository, UserRepository,
};
use quickpoll_db::test_utils::TestDatabase;
use sea_orm::Database;
use std::sync::Arc;

struct TestContext {
    db: TestDatabase,
    user_service: UserService,
    poll_service: PollService,
}

async fn setup() -> TestContext {
    let db = TestDatabase::create_unique().await.unwrap();
    quickpoll_db::migrate(db.connection()).await.unwrap();

    let conn = Arc::new(Database::connect(&db.config.database_url()).await.unwrap());

    let user_repo = UserRepository::new(Arc::clone(&conn));
    let user_service = UserService::new(user_repo.clone());
    let poll_service = PollService::new(
        PollRepository::new(Arc::clone(&conn)),
        PollOptionRepository::new(Arc::clone(&conn)),
        PollVoteRepository::new(Arc::clone(&conn)),
        PollLikeRepository::new(Arc::clone(&conn)),
        user_repo,
        Arc::new(NoOpEventPublisher),
    );

    TestContext {
        db,
        user_service,
        poll_service,
    }
}

async fn register_user(ctx: &TestContext, username: &str) -> String {
    ctx.user_service
        .register(CreateUserInput {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: "password123".to_string(),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_vote_replace_keeps_single_row() {
    let ctx = setup().await;
    let user_id = register_user(&ctx, "alice").await;

    let view = ctx
        .poll_service
        .create_poll(
            &user_id,
            CreatePollInput {
                title: "Favorite color?".to_string(),
                description: None,
                options: vec!["Red".to_string(), "Blue".to_string()],
            },
        )
        .await
        .unwrap();

    let poll_id = view.id.clone();
    let o1 = view.options[0].id.clone();
    let o2 = view.options[1].id.clone();

    // First vote
    let view = ctx.poll_service.cast_vote(&user_id, &poll_id, &o1).await.unwrap();
    assert_eq!(view.options[0].vote_count, 1);
    assert_eq!(view.options[1].vote_count, 0);
    assert_eq!(view.total_votes, 1);
    assert!(view.user_voted);
    assert_eq!(view.user_vote_option_id.as_deref(), Some(o1.as_str()));

    // Changing the vote replaces the row, it does not add one
    let view = ctx.poll_service.cast_vote(&user_id, &poll_id, &o2).await.unwrap();
    assert_eq!(view.options[0].vote_count, 0);
    assert_eq!(view.options[1].vote_count, 1);
    assert_eq!(view.total_votes, 1);
    assert_eq!(view.user_vote_option_id.as_deref(), Some(o2.as_str()));

    // Re-casting the held option changes nothing
    let view = ctx.poll_service.cast_vote(&user_id, &poll_id, &o2).await.unwrap();
    assert_eq!(view.total_votes, 1);
    assert_eq!(view.user_vote_option_id.as_deref(), Some(o2.as_str()));

    ctx.db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_like_toggle_alternates() {
    let ctx = setup().await;
    let user_id = register_user(&ctx, "bob").await;

    let view = ctx
        .poll_service
        .create_poll(
            &user_id,
            CreatePollInput {
                title: "Pineapple on pizza?".to_string(),
                description: None,
                options: vec!["Yes".to_string(), "No".to_string()],
            },
        )
        .await
        .unwrap();
    let poll_id = view.id;

    // A like exists after N toggles iff N is odd
    for n in 1..=4_i64 {
        let view = ctx.poll_service.toggle_like(&user_id, &poll_id).await.unwrap();
        let expected = n % 2;
        assert_eq!(view.like_count, expected);
        assert_eq!(view.user_liked, expected == 1);
    }

    ctx.db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_views_are_personalized_per_viewer() {
    let ctx = setup().await;
    let alice = register_user(&ctx, "alice2").await;
    let bob = register_user(&ctx, "bob2").await;

    let view = ctx
        .poll_service
        .create_poll(
            &alice,
            CreatePollInput {
                title: "Tabs or spaces?".to_string(),
                description: Some("The eternal question".to_string()),
                options: vec!["Tabs".to_string(), "Spaces".to_string()],
            },
        )
        .await
        .unwrap();
    let poll_id = view.id;
    let option = view.options[0].id.clone();

    ctx.poll_service.cast_vote(&alice, &poll_id, &option).await.unwrap();

    let for_alice = ctx
        .poll_service
        .get_view(&poll_id, Some(&alice))
        .await
        .unwrap();
    assert!(for_alice.user_voted);

    let for_bob = ctx.poll_service.get_view(&poll_id, Some(&bob)).await.unwrap();
    assert!(!for_bob.user_voted);
    assert_eq!(for_bob.total_votes, 1);

    let anonymous = ctx.poll_service.get_view(&poll_id, None).await.unwrap();
    assert!(!anonymous.user_voted);
    assert_eq!(anonymous.total_votes, 1);

    ctx.db.drop_database().await.unwrap();
}
