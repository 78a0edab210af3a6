//! Auth Module
//!
//! Token authentication and moderation checks in front of the `/api` routes,
//! backed by the short-TTL cache.

mod authenticator;
mod identity;
mod middleware;
mod moderation;

pub use authenticator::{AuthSettings, Authenticator};
pub use identity::{Identity, IdentityVerifier, StaticTokenVerifier, VerifiedIdentity};
pub use middleware::{require_auth, AUTH_TOKEN_HEADER};
pub use moderation::{ModerationStore, StaticModeration};
