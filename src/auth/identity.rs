//! Identity verification boundary.
//!
//! Hosted identity backends live outside this crate; they plug in through
//! [`IdentityVerifier`]. [`StaticTokenVerifier`] serves development setups
//! and tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AuthError;

/// Who made a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: String,
}

/// Result of a successful token check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub identity: Identity,
    /// When the token itself stops being valid
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}

/// Verifier over a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenVerifier {
    /// Default lifetime reported for every accepted token.
    pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    pub fn insert(&mut self, token: impl Into<String>, identity: Identity) {
        self.tokens.insert(token.into(), identity);
    }

    /// Parses a comma-separated list of `token:uid:email:display name`.
    /// Malformed entries are skipped.
    pub fn from_entries(entries: &str) -> Self {
        let mut verifier = Self::new();
        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.splitn(4, ':');
            if let (Some(token), Some(uid), Some(email), Some(name)) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            {
                verifier.insert(
                    token,
                    Identity {
                        uid: uid.to_string(),
                        email: email.to_string(),
                        display_name: name.to_string(),
                    },
                );
            }
        }
        verifier
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let identity = self.tokens.get(token).cloned().ok_or(AuthError::InvalidToken)?;
        let lifetime = chrono::Duration::from_std(Self::DEFAULT_LIFETIME)
            .map_err(|e| AuthError::Backend(e.to_string()))?;

        Ok(VerifiedIdentity {
            identity,
            expires_at: Utc::now() + lifetime,
        })
    }
}
