//! Poll endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use quickpoll_common::AppResult;
use quickpoll_core::{CreatePollInput, PollView};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
};

/// Request to create a poll.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePollRequest {
    #[validate(length(min = 5, max = 255))]
    pub title: String,

    pub description: Option<String>,

    #[validate(length(min = 2, max = 10))]
    pub options: Vec<CreateOptionRequest>,
}

/// One option of a poll being created.
#[derive(Debug, Deserialize, Serialize)]
pub struct CreateOptionRequest {
    pub text: String,
}

/// Create a poll. Options keep the order they were submitted in.
async fn create_poll(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePollRequest>,
) -> AppResult<(StatusCode, Json<PollView>)> {
    req.validate()?;

    let input = CreatePollInput {
        title: req.title,
        description: req.description,
        options: req.options.into_iter().map(|o| o.text).collect(),
    };

    let view = state.poll_service.create_poll(&user.id, input).await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// Listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// List active polls, newest first.
async fn list_polls(
    MaybeAuthUser(maybe_user): MaybeAuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<PollView>>> {
    let viewer = maybe_user.as_ref().map(|u| u.id.as_str());
    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let views = state.poll_service.list_polls(viewer, limit, skip).await?;
    Ok(Json(views))
}

/// Get a single poll's view.
async fn get_poll(
    MaybeAuthUser(maybe_user): MaybeAuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<Json<PollView>> {
    let viewer = maybe_user.as_ref().map(|u| u.id.as_str());
    let view = state.poll_service.get_view(&poll_id, viewer).await?;
    Ok(Json(view))
}

/// Vote request.
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub option_id: String,
}

/// Cast or replace a vote. Observers of the poll receive the update.
async fn vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> AppResult<Json<PollView>> {
    let view = state
        .poll_service
        .cast_vote(&user.id, &poll_id, &req.option_id)
        .await?;
    Ok(Json(view))
}

/// Toggle a like. Observers of the poll receive the update.
async fn like(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<Json<PollView>> {
    let view = state.poll_service.toggle_like(&user.id, &poll_id).await?;
    Ok(Json(view))
}

/// Delete a poll (creator only).
async fn delete_poll(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<StatusCode> {
    state.poll_service.delete_poll(&user.id, &poll_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/polls/", post(create_poll).get(list_polls))
        .route("/polls/{poll_id}", get(get_poll).delete(delete_poll))
        .route("/polls/{poll_id}/vote", post(vote))
        .route("/polls/{poll_id}/like", post(like))
}
