//! Core business logic for quickpoll-rs.

pub mod services;

pub use services::*;
