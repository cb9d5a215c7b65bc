//! Poll view computation.
//!
//! A [`PollView`] is the public snapshot of a poll: per-option tallies,
//! totals, and the viewer's own vote/like state. It is always rebuilt
//! from the stored rows, never patched incrementally, so counts cannot
//! drift from ground truth.

use quickpoll_db::entities::{poll, poll_like, poll_option, poll_vote};
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One option of a poll with its current tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOptionView {
    pub id: String,
    pub text: String,
    pub display_order: i32,
    pub vote_count: i64,
}

/// Snapshot of a poll's aggregate and viewer-specific state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub creator_id: String,
    pub creator_username: String,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub options: Vec<PollOptionView>,
    pub total_votes: i64,
    pub like_count: i64,
    pub user_voted: bool,
    pub user_liked: bool,
    pub user_vote_option_id: Option<String>,
}

/// Build a poll's view from its stored rows.
///
/// Pure and deterministic: identical inputs always produce identical
/// views. Options are ordered by `display_order`, ties broken by id.
/// With no `viewer` the per-viewer flags default to false/absent.
#[must_use]
pub fn build_poll_view(
    poll: &poll::Model,
    creator_username: &str,
    options: &[poll_option::Model],
    votes: &[poll_vote::Model],
    likes: &[poll_like::Model],
    viewer: Option<&str>,
) -> PollView {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for vote in votes {
        *counts.entry(vote.option_id.as_str()).or_insert(0) += 1;
    }

    let mut ordered: Vec<&poll_option::Model> = options.iter().collect();
    ordered.sort_by(|a, b| {
        a.display_order
            .cmp(&b.display_order)
            .then_with(|| a.id.cmp(&b.id))
    });

    let option_views: Vec<PollOptionView> = ordered
        .into_iter()
        .map(|option| PollOptionView {
            id: option.id.clone(),
            text: option.text.clone(),
            display_order: option.display_order,
            vote_count: counts.get(option.id.as_str()).copied().unwrap_or(0),
        })
        .collect();

    // Summing the per-option tallies keeps total_votes consistent with
    // the options by construction.
    let total_votes = option_views.iter().map(|o| o.vote_count).sum();

    let viewer_vote = viewer.and_then(|id| votes.iter().find(|v| v.user_id == id));
    let user_liked = viewer.is_some_and(|id| likes.iter().any(|l| l.user_id == id));

    PollView {
        id: poll.id.clone(),
        title: poll.title.clone(),
        description: poll.description.clone(),
        creator_id: poll.user_id.clone(),
        creator_username: creator_username.to_string(),
        is_active: poll.is_active,
        created_at: poll.created_at,
        options: option_views,
        total_votes,
        like_count: likes.len() as i64,
        user_voted: viewer_vote.is_some(),
        user_liked,
        user_vote_option_id: viewer_vote.map(|v| v.option_id.clone()),
    }
}
