//! API middleware.

#![allow(missing_docs)]

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use quickpoll_core::{PollService, TokenService, UserService};

use crate::streaming::PollStreams;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub poll_service: PollService,
    pub token_service: TokenService,
    pub poll_streams: PollStreams,
}

/// Authentication middleware.
///
/// Verifies a `Bearer` access token and stores the resolved user in the
/// request extensions. Requests without a valid token proceed
/// unauthenticated; endpoints that require identity reject them via the
/// `AuthUser` extractor.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && let Ok(claims) = state.token_service.verify(token)
    {
        // Token is valid; attach the user if the account still exists
        if let Ok(user) = state.user_service.get(&claims.sub).await {
            req.extensions_mut().insert(user);
        }
    }

    next.run(req).await
}
