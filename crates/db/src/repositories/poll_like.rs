//! Poll like repository.

use std::sync::Arc;

use crate::entities::{poll_like, PollLike};
use quickpoll_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, SqlErr};

/// Poll like repository for database operations.
#[derive(Clone)]
pub struct PollLikeRepository {
    db: Arc<DatabaseConnection>,
}

impl PollLikeRepository {
    /// Create a new poll like repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user's like on a poll.
    pub async fn find_by_user_and_poll(
        &self,
        user_id: &str,
        poll_id: &str,
    ) -> AppResult<Option<poll_like::Model>> {
        PollLike::find()
            .filter(poll_like::Column::UserId.eq(user_id))
            .filter(poll_like::Column::PollId.eq(poll_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all likes on a poll.
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<poll_like::Model>> {
        PollLike::find()
            .filter(poll_like::Column::PollId.eq(poll_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a new like.
    ///
    /// A violation of the (user, poll) unique index surfaces as
    /// [`AppError::Conflict`].
    pub async fn create(&self, model: poll_like::ActiveModel) -> AppResult<poll_like::Model> {
        model.insert(self.db.as_ref()).await.map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                AppError::Conflict("User has already liked this poll".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })
    }

    /// Delete a like.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        PollLike::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
