//! Poll vote repository.

use std::sync::Arc;

use crate::entities::{poll_vote, PollVote};
use quickpoll_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
};

/// Poll vote repository for database operations.
#[derive(Clone)]
pub struct PollVoteRepository {
    db: Arc<DatabaseConnection>,
}

impl PollVoteRepository {
    /// Create a new poll vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user's vote on a poll.
    pub async fn find_by_user_and_poll(
        &self,
        user_id: &str,
        poll_id: &str,
    ) -> AppResult<Option<poll_vote::Model>> {
        PollVote::find()
            .filter(poll_vote::Column::UserId.eq(user_id))
            .filter(poll_vote::Column::PollId.eq(poll_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all votes on a poll.
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<poll_vote::Model>> {
        PollVote::find()
            .filter(poll_vote::Column::PollId.eq(poll_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a new vote.
    ///
    /// A violation of the (user, poll) unique index surfaces as
    /// [`AppError::Conflict`] so the caller can recover from the race.
    pub async fn create(&self, model: poll_vote::ActiveModel) -> AppResult<poll_vote::Model> {
        model.insert(self.db.as_ref()).await.map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                AppError::Conflict("User has already voted on this poll".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })
    }

    /// Re-point an existing vote at a different option.
    ///
    /// The row keeps its identity and `created_at`; only the option
    /// reference changes.
    pub async fn update_option(
        &self,
        vote: poll_vote::Model,
        option_id: &str,
    ) -> AppResult<poll_vote::Model> {
        let mut active: poll_vote::ActiveModel = vote.into();
        active.option_id = Set(option_id.to_string());

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
