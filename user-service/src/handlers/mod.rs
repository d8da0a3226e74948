//! HTTP handlers for user-service.

pub mod auth;
pub mod user;

pub use auth::*;
pub use user::*;
