//! Moderation and permission lookups.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::AuthError;

/// Source of admin and blacklist membership, usually a database.
#[async_trait]
pub trait ModerationStore: Send + Sync {
    async fn is_admin(&self, email: &str) -> Result<bool, AuthError>;
    async fn is_blacklisted(&self, email: &str) -> Result<bool, AuthError>;
}

/// Fixed admin and blacklist sets. Emails compare case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct StaticModeration {
    admins: HashSet<String>,
    blacklist: HashSet<String>,
}

impl StaticModeration {
    pub fn new<A, B>(admins: A, blacklist: B) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        Self {
            admins: admins.into_iter().map(|e| normalize(e.as_ref())).collect(),
            blacklist: blacklist.into_iter().map(|e| normalize(e.as_ref())).collect(),
        }
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl ModerationStore for StaticModeration {
    async fn is_admin(&self, email: &str) -> Result<bool, AuthError> {
        Ok(self.admins.contains(&normalize(email)))
    }

    async fn is_blacklisted(&self, email: &str) -> Result<bool, AuthError> {
        Ok(self.blacklist.contains(&normalize(email)))
    }
}
