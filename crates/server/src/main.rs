//! QuickPoll server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{http::HeaderValue, middleware, routing::get, Json, Router};
use quickpoll_api::{middleware::AppState, poll_stream_handler, router as api_router, PollStreams};
use quickpoll_common::Config;
use quickpoll_core::{PollService, TokenService, UserService};
use quickpoll_db::repositories::{
    PollLikeRepository, PollOptionRepository, PollRepository, PollVoteRepository, UserRepository,
};
use serde_json::json;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quickpoll=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting quickpoll server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = quickpoll_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    quickpoll_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let option_repo = PollOptionRepository::new(Arc::clone(&db));
    let vote_repo = PollVoteRepository::new(Arc::clone(&db));
    let like_repo = PollLikeRepository::new(Arc::clone(&db));

    // Initialize the broadcast hub; it doubles as the poll service's
    // event publisher so mutations fan out to live observers
    let poll_streams = PollStreams::new();

    // Initialize services
    let user_service = UserService::new(user_repo.clone());
    let token_service = TokenService::from_config(&config);
    let poll_service = PollService::new(
        poll_repo,
        option_repo,
        vote_repo,
        like_repo,
        user_repo,
        Arc::new(poll_streams.clone()),
    );

    // Create app state
    let state = AppState {
        user_service,
        poll_service,
        token_service,
        poll_streams,
    };

    let cors = CorsLayer::new()
        .allow_origin(config.server.frontend_url.parse::<HeaderValue>()?)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/ws/polls/{poll_id}", get(poll_stream_handler))
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            quickpoll_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
