pub mod auth;
pub mod resource;

pub use auth::{auth_middleware, session_token, AuthUser, CurrentUser, SESSION_COOKIE};
pub use resource::resource_guard;
