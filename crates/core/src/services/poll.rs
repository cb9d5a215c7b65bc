//! Poll service.

use chrono::Utc;
use quickpoll_common::{AppError, AppResult, IdGenerator};
use quickpoll_db::{
    entities::{poll, poll_like, poll_option, poll_vote},
    repositories::{
        PollLikeRepository, PollOptionRepository, PollRepository, PollVoteRepository,
        UserRepository,
    },
};
use sea_orm::Set;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::services::event_publisher::EventPublisherService;
use crate::services::view::{build_poll_view, PollView};

/// Per-poll advisory locks.
///
/// A mutation holds its poll's lock across mutate, recompute and publish
/// so observers receive snapshots in application order. The (user, poll)
/// unique indexes remain the authoritative guard against duplicate rows.
#[derive(Clone, Default)]
pub struct PollLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl PollLocks {
    /// Acquire the lock for a poll, creating it on first use.
    pub async fn acquire(&self, poll_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            Arc::clone(map.entry(poll_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    option_repo: PollOptionRepository,
    vote_repo: PollVoteRepository,
    like_repo: PollLikeRepository,
    user_repo: UserRepository,
    publisher: EventPublisherService,
    locks: PollLocks,
    id_gen: IdGenerator,
}

/// Input for creating a poll.
pub struct CreatePollInput {
    pub title: String,
    pub description: Option<String>,
    pub options: Vec<String>,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub fn new(
        poll_repo: PollRepository,
        option_repo: PollOptionRepository,
        vote_repo: PollVoteRepository,
        like_repo: PollLikeRepository,
        user_repo: UserRepository,
        publisher: EventPublisherService,
    ) -> Self {
        Self {
            poll_repo,
            option_repo,
            vote_repo,
            like_repo,
            user_repo,
            publisher,
            locks: PollLocks::default(),
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a poll with its options.
    pub async fn create_poll(&self, user_id: &str, input: CreatePollInput) -> AppResult<PollView> {
        let title = input.title.trim().to_string();
        if title.len() < 5 || title.len() > 255 {
            return Err(AppError::BadRequest(
                "Title must be between 5 and 255 characters".to_string(),
            ));
        }
        if input.options.len() < 2 {
            return Err(AppError::BadRequest(
                "Poll must have at least 2 options".to_string(),
            ));
        }
        if input.options.len() > 10 {
            return Err(AppError::BadRequest(
                "Poll cannot have more than 10 options".to_string(),
            ));
        }
        for text in &input.options {
            if text.trim().is_empty() || text.len() > 255 {
                return Err(AppError::BadRequest(
                    "Option text must be between 1 and 255 characters".to_string(),
                ));
            }
        }

        let poll = self
            .poll_repo
            .create(poll::ActiveModel {
                id: Set(self.id_gen.generate()),
                title: Set(title),
                description: Set(input.description),
                user_id: Set(user_id.to_string()),
                is_active: Set(true),
                created_at: Set(Utc::now().into()),
                updated_at: Set(None),
            })
            .await?;

        for (index, text) in input.options.iter().enumerate() {
            self.option_repo
                .create(poll_option::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    poll_id: Set(poll.id.clone()),
                    text: Set(text.trim().to_string()),
                    display_order: Set(index as i32),
                    created_at: Set(Utc::now().into()),
                })
                .await?;
        }

        tracing::info!(poll_id = %poll.id, user_id = %user_id, "Poll created");

        self.assemble(&poll, Some(user_id)).await
    }

    /// Get a poll's view, personalized to `viewer` when present.
    pub async fn get_view(&self, poll_id: &str, viewer: Option<&str>) -> AppResult<PollView> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        self.assemble(&poll, viewer).await
    }

    /// List active polls, newest first.
    pub async fn list_polls(
        &self,
        viewer: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<PollView>> {
        let polls = self.poll_repo.list_active(limit, offset).await?;

        let mut views = Vec::with_capacity(polls.len());
        for poll in &polls {
            views.push(self.assemble(poll, viewer).await?);
        }
        Ok(views)
    }

    /// Cast or replace the user's vote on a poll.
    ///
    /// A user holds at most one vote per poll: voting again re-points the
    /// existing row at the new option. On success every observer of the
    /// poll receives the recomputed view.
    pub async fn cast_vote(
        &self,
        user_id: &str,
        poll_id: &str,
        option_id: &str,
    ) -> AppResult<PollView> {
        let _guard = self.locks.acquire(poll_id).await;

        let poll = self.poll_repo.get_by_id(poll_id).await?;
        if !poll.is_active {
            return Err(AppError::PollNotFound(poll_id.to_string()));
        }

        let option = self
            .option_repo
            .find_by_id(option_id)
            .await?
            .filter(|o| o.poll_id == poll.id)
            .ok_or_else(|| {
                AppError::InvalidTarget("Option does not belong to this poll".to_string())
            })?;

        match self.vote_repo.find_by_user_and_poll(user_id, poll_id).await? {
            Some(vote) if vote.option_id == option.id => {
                // Re-casting the held option: stored state is already correct
            }
            Some(vote) => {
                self.vote_repo.update_option(vote, &option.id).await?;
            }
            None => {
                let model = poll_vote::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    poll_id: Set(poll.id.clone()),
                    user_id: Set(user_id.to_string()),
                    option_id: Set(option.id.clone()),
                    created_at: Set(Utc::now().into()),
                };

                match self.vote_repo.create(model).await {
                    Ok(_) => {}
                    Err(AppError::Conflict(_)) => {
                        // Lost the insert race: recover as update-in-place
                        let vote = self
                            .vote_repo
                            .find_by_user_and_poll(user_id, poll_id)
                            .await?
                            .ok_or_else(|| {
                                AppError::Conflict(
                                    "Concurrent vote could not be resolved".to_string(),
                                )
                            })?;
                        self.vote_repo.update_option(vote, &option.id).await?;
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        tracing::debug!(poll_id = %poll.id, user_id = %user_id, option_id = %option.id, "Vote cast");

        let (broadcast, personal) = self.assemble_pair(&poll, user_id).await?;
        if let Err(e) = self.publisher.publish_vote_update(&poll.id, &broadcast).await {
            tracing::warn!(error = %e, poll_id = %poll.id, "Failed to publish vote update");
        }

        Ok(personal)
    }

    /// Toggle the user's like on a poll.
    ///
    /// A strict flip: a like exists after the call iff it did not before.
    /// On success every observer of the poll receives the recomputed view.
    pub async fn toggle_like(&self, user_id: &str, poll_id: &str) -> AppResult<PollView> {
        let _guard = self.locks.acquire(poll_id).await;

        let poll = self.poll_repo.get_by_id(poll_id).await?;

        match self.like_repo.find_by_user_and_poll(user_id, poll_id).await? {
            Some(like) => {
                self.like_repo.delete(&like.id).await?;
            }
            None => {
                let model = poll_like::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    poll_id: Set(poll.id.clone()),
                    user_id: Set(user_id.to_string()),
                    created_at: Set(Utc::now().into()),
                };
                // A unique-index race surfaces as Conflict: the competing
                // toggle already flipped the state
                self.like_repo.create(model).await?;
            }
        }

        tracing::debug!(poll_id = %poll.id, user_id = %user_id, "Like toggled");

        let (broadcast, personal) = self.assemble_pair(&poll, user_id).await?;
        if let Err(e) = self.publisher.publish_like_update(&poll.id, &broadcast).await {
            tracing::warn!(error = %e, poll_id = %poll.id, "Failed to publish like update");
        }

        Ok(personal)
    }

    /// Delete a poll. Only the creator may delete it.
    pub async fn delete_poll(&self, user_id: &str, poll_id: &str) -> AppResult<()> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;

        if poll.user_id != user_id {
            return Err(AppError::Forbidden(
                "Not authorized to delete this poll".to_string(),
            ));
        }

        self.poll_repo.delete(poll_id).await?;
        tracing::info!(poll_id = %poll_id, user_id = %user_id, "Poll deleted");
        Ok(())
    }

    /// Fetch a poll's rows and build one view.
    async fn assemble(&self, poll: &poll::Model, viewer: Option<&str>) -> AppResult<PollView> {
        let creator = self.user_repo.get_by_id(&poll.user_id).await?;
        let options = self.option_repo.find_by_poll(&poll.id).await?;
        let votes = self.vote_repo.find_by_poll(&poll.id).await?;
        let likes = self.like_repo.find_by_poll(&poll.id).await?;

        Ok(build_poll_view(
            poll,
            &creator.username,
            &options,
            &votes,
            &likes,
            viewer,
        ))
    }

    /// Fetch a poll's rows once and build the anonymous broadcast view
    /// together with the view personalized to the acting user.
    async fn assemble_pair(
        &self,
        poll: &poll::Model,
        user_id: &str,
    ) -> AppResult<(PollView, PollView)> {
        let creator = self.user_repo.get_by_id(&poll.user_id).await?;
        let options = self.option_repo.find_by_poll(&poll.id).await?;
        let votes = self.vote_repo.find_by_poll(&poll.id).await?;
        let likes = self.like_repo.find_by_poll(&poll.id).await?;

        let broadcast = build_poll_view(poll, &creator.username, &options, &votes, &likes, None);
        let personal = build_poll_view(
            poll,
            &creator.username,
            &options,
            &votes,
            &likes,
            Some(user_id),
        );
        Ok((broadcast, personal))
    }
}
