//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::AuthSettings;
use crate::broadcast::HeartbeatPolicy;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Pump loop tick in milliseconds
    pub heartbeat_tick_ms: u64,
    /// Empty ticks before an idle stream gets a ping
    pub heartbeat_idle_ticks: u32,
    /// Upper bound in seconds for caching a verified token
    pub token_cache_ttl: u64,
    /// Lifetime in seconds of cached admin / blacklist answers
    pub permission_cache_ttl: u64,
    /// Only emails under this domain may sign in
    pub allowed_email_domain: Option<String>,
    /// Emails with moderator rights
    pub admin_emails: Vec<String>,
    /// Emails refused on every authenticated route
    pub blacklisted_emails: Vec<String>,
    /// `token:uid:email:display name` entries for the built-in verifier
    pub auth_tokens: String,
    /// Largest accepted post content in bytes
    pub max_post_bytes: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `HEARTBEAT_TICK_MS` - Pump loop tick (default: 1000)
    /// - `HEARTBEAT_IDLE_TICKS` - Empty ticks before a ping (default: 5)
    /// - `TOKEN_CACHE_TTL` - Token cache bound in seconds (default: 180)
    /// - `PERMISSION_CACHE_TTL` - Permission cache in seconds (default: 600)
    /// - `ALLOWED_EMAIL_DOMAIN` - Sign-in domain restriction (default: none)
    /// - `ADMIN_EMAILS`, `BLACKLISTED_EMAILS` - Comma-separated lists
    /// - `AUTH_TOKENS` - Comma-separated `token:uid:email:name` entries
    /// - `MAX_POST_BYTES` - Post size limit (default: 20 MiB)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            heartbeat_tick_ms: parse_var("HEARTBEAT_TICK_MS").unwrap_or(defaults.heartbeat_tick_ms),
            heartbeat_idle_ticks: parse_var("HEARTBEAT_IDLE_TICKS")
                .unwrap_or(defaults.heartbeat_idle_ticks),
            token_cache_ttl: parse_var("TOKEN_CACHE_TTL").unwrap_or(defaults.token_cache_ttl),
            permission_cache_ttl: parse_var("PERMISSION_CACHE_TTL")
                .unwrap_or(defaults.permission_cache_ttl),
            allowed_email_domain: env::var("ALLOWED_EMAIL_DOMAIN")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            admin_emails: list_var("ADMIN_EMAILS"),
            blacklisted_emails: list_var("BLACKLISTED_EMAILS"),
            auth_tokens: env::var("AUTH_TOKENS").unwrap_or_default(),
            max_post_bytes: parse_var("MAX_POST_BYTES").unwrap_or(defaults.max_post_bytes),
        }
    }

    pub fn heartbeat(&self) -> HeartbeatPolicy {
        HeartbeatPolicy::new(
            Duration::from_millis(self.heartbeat_tick_ms.max(1)),
            self.heartbeat_idle_ticks,
        )
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            token_ttl: Duration::from_secs(self.token_cache_ttl),
            permission_ttl: Duration::from_secs(self.permission_cache_ttl),
            allowed_domain: self.allowed_email_domain.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            heartbeat_tick_ms: 1000,
            heartbeat_idle_ticks: 5,
            token_cache_ttl: 180,
            permission_cache_ttl: 600,
            allowed_email_domain: None,
            admin_emails: Vec::new(),
            blacklisted_emails: Vec::new(),
            auth_tokens: String::new(),
            max_post_bytes: 20 * 1024 * 1024,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn list_var(name: &str) -> Vec<String> {
    env::var(name)
        .map(|v| split_list(&v))
        .unwrap_or_default()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
