//! Database repositories.

mod poll;
mod poll_like;
mod poll_vote;
mod user;

pub use poll::{PollOptionRepository, PollRepository};
pub use poll_like::PollLikeRepository;
pub use poll_vote::PollVoteRepository;
pub use user::UserRepository;
