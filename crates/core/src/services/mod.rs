//! Business logic services.

#![allow(missing_docs)]

pub mod event_publisher;
pub mod poll;
pub mod token;
pub mod user;
pub mod view;

pub use event_publisher::{EventPublisher, EventPublisherService, NoOpEventPublisher};
pub use poll::{CreatePollInput, PollLocks, PollService};
pub use token::{TokenClaims, TokenService};
pub use user::{CreateUserInput, UserService};
pub use view::{build_poll_view, PollOptionView, PollView};
