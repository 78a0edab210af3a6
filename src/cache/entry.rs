//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with optional expiry.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// A single stored value and the instant it stops being visible.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Expiration instant, None = kept until deleted
    pub expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    // == Constructors ==
    /// Creates an entry that expires `ttl` after `now`.
    pub fn expiring(value: V, now: Instant, ttl: Duration) -> Self {
        Self {
            value,
            // A TTL past the end of representable time means never
            expires_at: now.checked_add(ttl),
        }
    }

    /// Creates an entry with no expiration.
    pub fn forever(value: V) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of `now`.
    ///
    /// Boundary condition: an entry is expired once `now` reaches the
    /// expiration instant, so a TTL of zero is never observable.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, `Some(ZERO)` once expired, `None` for forever entries.
    pub fn ttl_remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(now))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forever_entry_never_expires() {
        let now = Instant::now();
        let entry = CacheEntry::forever("value");

        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired(now + Duration::from_secs(10 * 365 * 24 * 3600)));
        assert!(entry.ttl_remaining(now).is_none());
    }

    #[test]
    fn test_expiring_entry() {
        let now = Instant::now();
        let entry = CacheEntry::expiring("value", now, Duration::from_secs(60));

        assert!(!entry.is_expired(now));
        assert!(!entry.is_expired(now + Duration::from_secs(59)));
        assert!(entry.is_expired(now + Duration::from_secs(61)));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let entry = CacheEntry::expiring("value", now, Duration::from_secs(1));

        // Expired exactly when the TTL has fully elapsed
        assert!(entry.is_expired(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_zero_ttl_is_expired_immediately() {
        let now = Instant::now();
        let entry = CacheEntry::expiring("value", now, Duration::ZERO);

        assert!(entry.is_expired(now));
    }

    #[test]
    fn test_ttl_remaining() {
        let now = Instant::now();
        let entry = CacheEntry::expiring("value", now, Duration::from_secs(10));

        assert_eq!(
            entry.ttl_remaining(now + Duration::from_secs(4)),
            Some(Duration::from_secs(6))
        );
        assert_eq!(
            entry.ttl_remaining(now + Duration::from_secs(30)),
            Some(Duration::ZERO)
        );
    }
}
