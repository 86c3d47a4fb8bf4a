//! In-memory response cache with a fixed expiry
//!
//! Entries are keyed by a request fingerprint (provider, endpoint and
//! parameters). Reads treat anything older than the TTL as absent; a
//! background sweep owned by the client removes such entries once a minute
//! (see [`crate::client`]).

use crate::types::{AssetQuote, SearchMatch};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// Request fingerprint: `provider:endpoint:params`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn markets(provider: &str, currency: &str, limit: usize) -> Self {
        Self(format!("{}:markets:{}:{}", provider, currency, limit))
    }

    pub fn asset(provider: &str, id: &str, currency: &str) -> Self {
        Self(format!("{}:asset:{}:{}", provider, id, currency))
    }

    pub fn search(provider: &str, query: &str) -> Self {
        Self(format!("{}:search:{}", provider, query.to_lowercase()))
    }

    pub fn trending(provider: &str) -> Self {
        Self(format!("{}:trending", provider))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last successful response for a fingerprint
#[derive(Debug, Clone, PartialEq)]
pub enum CachedPayload {
    Quotes(Vec<AssetQuote>),
    Quote(AssetQuote),
    Matches(Vec<SearchMatch>),
}

/// Values that can be stored in the response cache
pub trait Cacheable: Sized {
    fn into_payload(self) -> CachedPayload;
    fn from_payload(payload: CachedPayload) -> Option<Self>;
}

impl Cacheable for Vec<AssetQuote> {
    fn into_payload(self) -> CachedPayload {
        CachedPayload::Quotes(self)
    }

    fn from_payload(payload: CachedPayload) -> Option<Self> {
        match payload {
            CachedPayload::Quotes(quotes) => Some(quotes),
            _ => None,
        }
    }
}

impl Cacheable for AssetQuote {
    fn into_payload(self) -> CachedPayload {
        CachedPayload::Quote(self)
    }

    fn from_payload(payload: CachedPayload) -> Option<Self> {
        match payload {
            CachedPayload::Quote(quote) => Some(quote),
            _ => None,
        }
    }
}

impl Cacheable for Vec<SearchMatch> {
    fn into_payload(self) -> CachedPayload {
        CachedPayload::Matches(self)
    }

    fn from_payload(payload: CachedPayload) -> Option<Self> {
        match payload {
            CachedPayload::Matches(matches) => Some(matches),
            _ => None,
        }
    }
}

struct CacheEntry {
    payload: CachedPayload,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() >= ttl
    }
}

/// Response cache shared by the client and its sweep task
pub struct ResponseCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl ResponseCache {
    /// Creates an empty cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the payload for `key` unless it is missing or expired
    ///
    /// Expired entries are left in place for the sweep to collect.
    pub fn get(&self, key: &CacheKey) -> Option<CachedPayload> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;
        if entry.is_expired(self.ttl) {
            tracing::debug!(key = %key, "Cache entry expired");
            return None;
        }
        tracing::debug!(key = %key, "Cache hit");
        Some(entry.payload.clone())
    }

    /// Stores `payload`, replacing any previous entry for `key`
    pub fn insert(&self, key: CacheKey, payload: CachedPayload) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key,
            CacheEntry {
                payload,
                stored_at: Instant::now(),
            },
        );
    }

    /// Typed read; a payload of another shape counts as a miss
    pub fn get_as<T: Cacheable>(&self, key: &CacheKey) -> Option<T> {
        self.get(key).and_then(T::from_payload)
    }

    /// Typed write
    pub fn put<T: Cacheable>(&self, key: CacheKey, value: T) {
        self.insert(key, value.into_payload());
    }

    /// Removes expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(self.ttl));
        before - entries.len()
    }

    /// Number of stored entries, expired or not
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::quote;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        let key = CacheKey::asset("coingecko", "bitcoin", "usd");
        cache.insert(key.clone(), CachedPayload::Quote(quote("bitcoin", 1.0, 1.0)));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.get(&key).is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&key).is_none());
        // Expired reads do not purge
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keys_include_provider_and_params() {
        assert_ne!(
            CacheKey::markets("coingecko", "usd", 5),
            CacheKey::markets("moonpay", "usd", 5)
        );
        assert_ne!(
            CacheKey::markets("coingecko", "usd", 5),
            CacheKey::markets("coingecko", "usd", 10)
        );
        assert_eq!(CacheKey::search("coingecko", "BTC"), CacheKey::search("coingecko", "btc"));
    }

    #[tokio::test]
    async fn test_typed_access_checks_shape() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        let key = CacheKey::markets("coingecko", "usd", 1);
        cache.put(key.clone(), vec![quote("bitcoin", 1.0, 1.0)]);

        assert!(cache.get_as::<AssetQuote>(&key).is_none());
        assert_eq!(cache.get_as::<Vec<AssetQuote>>(&key).map(|q| q.len()), Some(1));
    }
}
