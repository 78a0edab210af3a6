//! Cached authentication and permission checks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::identity::{Identity, IdentityVerifier};
use super::moderation::ModerationStore;
use crate::cache::{CachedValue, SharedCache};
use crate::error::AuthError;

const TOKEN_KEY_PREFIX: &str = "tokenInfo;";
const ADMIN_KEY_PREFIX: &str = "userAdmin;";
const BLACKLIST_KEY_PREFIX: &str = "userBlacklist;";

/// Cache lifetimes and the sign-in domain restriction.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Upper bound for caching a verified identity
    pub token_ttl: Duration,
    /// Lifetime of cached admin / blacklist answers
    pub permission_ttl: Duration,
    /// Only emails under this domain may sign in; None allows any
    pub allowed_domain: Option<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(180),
            permission_ttl: Duration::from_secs(600),
            allowed_domain: None,
        }
    }
}

/// Front door for identity and permission questions.
///
/// Answers come from the cache when possible so the verifier and the
/// moderation store are not hit on every request.
#[derive(Clone)]
pub struct Authenticator {
    cache: SharedCache<CachedValue>,
    verifier: Arc<dyn IdentityVerifier>,
    moderation: Arc<dyn ModerationStore>,
    settings: AuthSettings,
}

impl Authenticator {
    pub fn new(
        cache: SharedCache<CachedValue>,
        verifier: Arc<dyn IdentityVerifier>,
        moderation: Arc<dyn ModerationStore>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            cache,
            verifier,
            moderation,
            settings,
        }
    }

    /// Resolves a token to an identity.
    ///
    /// A verified identity is cached for the shorter of the configured token
    /// TTL and the token's own remaining lifetime.
    pub async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let key = format!("{TOKEN_KEY_PREFIX}{token}");
        if let Some(CachedValue::Identity(identity)) = self.cache.lock().await.get(&key) {
            return Ok(identity);
        }

        let verified = self.verifier.verify(token).await?;
        if !self.domain_allowed(&verified.identity.email) {
            return Err(AuthError::DomainNotAllowed);
        }

        // Negative remaining lifetime fails the conversion
        let remaining = (verified.expires_at - Utc::now()).to_std().unwrap_or_default();
        let ttl = remaining.min(self.settings.token_ttl);
        if !ttl.is_zero() {
            self.cache
                .lock()
                .await
                .set(key, CachedValue::Identity(verified.identity.clone()), ttl);
        }

        debug!(uid = %verified.identity.uid, cached_for = ?ttl, "Verified auth token");
        Ok(verified.identity)
    }

    pub async fn is_admin(&self, email: &str) -> Result<bool, AuthError> {
        let key = format!("{ADMIN_KEY_PREFIX}{email}");
        if let Some(flag) = self.cached_flag(&key).await {
            return Ok(flag);
        }

        let flag = self.moderation.is_admin(email).await?;
        self.store_flag(key, flag).await;
        Ok(flag)
    }

    pub async fn is_blacklisted(&self, email: &str) -> Result<bool, AuthError> {
        let key = format!("{BLACKLIST_KEY_PREFIX}{email}");
        if let Some(flag) = self.cached_flag(&key).await {
            return Ok(flag);
        }

        let flag = self.moderation.is_blacklisted(email).await?;
        self.store_flag(key, flag).await;
        Ok(flag)
    }

    fn domain_allowed(&self, email: &str) -> bool {
        match &self.settings.allowed_domain {
            Some(domain) => email
                .rsplit_once('@')
                .is_some_and(|(_, host)| host.eq_ignore_ascii_case(domain)),
            None => true,
        }
    }

    async fn cached_flag(&self, key: &str) -> Option<bool> {
        match self.cache.lock().await.get(key) {
            Some(CachedValue::Flag(flag)) => Some(flag),
            _ => None,
        }
    }

    async fn store_flag(&self, key: String, flag: bool) {
        self.cache
            .lock()
            .await
            .set(key, CachedValue::Flag(flag), self.settings.permission_ttl);
    }
}
