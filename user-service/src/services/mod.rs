//! Business logic for user-service: the auth orchestrator and the
//! collaborators it drives.

pub mod auth;
pub mod avatar;
pub mod clock;
mod database;
pub mod email;
pub mod error;
pub mod memory;
pub mod oauth;
pub mod resources;
pub mod session;
pub mod tokens;
pub mod users;

pub use auth::{AuthService, AuthSession, AuthSettings, Collaborators};
pub use avatar::{AvatarStore, AvatarUpload, CloudinaryAvatarStore, DisabledAvatarStore, MockAvatarStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use database::MongoDb;
pub use email::{ConsoleEmailService, EmailProvider, MockEmailService, SentEmail, SmtpEmailService};
pub use error::{AuthError, GrantFailure};
pub use memory::InMemoryStore;
pub use oauth::{
    DisabledIdentityProvider, FederatedIdentity, GoogleIdentityProvider, IdentityProvider,
    MockIdentityProvider,
};
pub use resources::{ResourceKind, ResourceOwners};
pub use session::{SessionClaims, SessionError, SessionIssuer};
pub use tokens::{spawn_token_sweeper, OtpStore, ResetTokenStore};
pub use users::UserStore;
