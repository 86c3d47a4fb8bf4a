//! Market data client
//!
//! Serves display-ready quotes through a fixed chain: cache, primary
//! provider (with retries and the rate-limit gate), secondary provider,
//! and finally built-in data. None of the public operations return errors.

use crate::{
    cache::{CacheKey, Cacheable, ResponseCache},
    config::ClientConfig,
    constants::{
        CACHE_SWEEP_INTERVAL_SECS, CACHE_TTL_SECS, DEFAULT_RATE_LIMIT_BACKOFF_SECS,
        IMAGE_LOOKUP_COOLDOWN_SECS, MAX_RETRY_ATTEMPTS, MAX_SEARCH_RESULTS, RETRY_DELAY_MS,
    },
    error::ProviderError,
    images::{HttpImageProbe, ImageProbe, ImageResolver},
    ledger::{CallLedger, RateLimitGate},
    metrics::{MetricsCollector, ProviderMetrics, RequestOutcome},
    provider::MarketDataProvider,
    providers::{CoinGeckoProvider, MoonPayProvider},
    types::{fallback_quotes, AssetQuote, ComponentHealth, HealthStatus, SearchMatch},
};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

/// Market data client
///
/// Owns the response cache, the per-identifier call ledger, the rate-limit
/// gate and the cache sweep task. Dropping the client (or calling
/// [`shutdown`](Self::shutdown)) stops the sweep.
///
/// # Example
/// ```no_run
/// use godsdollar_market_data::{format_price, MarketDataClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = MarketDataClient::from_env()?;
///
/// for quote in client.list_top_assets("usd", 5).await {
///     let image = client.resolve_image_url(&quote.id);
///     println!("{} {} {}", quote.name, format_price(quote.current_price), image);
/// }
/// # Ok(())
/// # }
/// ```
pub struct MarketDataClient {
    primary: Arc<dyn MarketDataProvider>,
    secondary: Arc<dyn MarketDataProvider>,
    cache: Arc<ResponseCache>,
    gate: Arc<RateLimitGate>,
    ledger: Arc<CallLedger>,
    images: ImageResolver,
    primary_metrics: MetricsCollector,
    secondary_metrics: MetricsCollector,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl MarketDataClient {
    /// Creates a client backed by CoinGecko and MoonPay
    pub fn new(config: &ClientConfig) -> Result<Self, ProviderError> {
        Ok(Self::with_providers(
            Arc::new(CoinGeckoProvider::new(config)?),
            Arc::new(MoonPayProvider::new(config)?),
            Arc::new(HttpImageProbe::new()?),
        ))
    }

    /// Creates a client configured from environment variables
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(&ClientConfig::from_env())
    }

    /// Creates a client with custom providers
    ///
    /// This is primarily for testing with mock providers. The cache sweep
    /// starts only when called inside a tokio runtime.
    pub fn with_providers(
        primary: Arc<dyn MarketDataProvider>,
        secondary: Arc<dyn MarketDataProvider>,
        probe: Arc<dyn ImageProbe>,
    ) -> Self {
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(CACHE_TTL_SECS)));
        let gate = Arc::new(RateLimitGate::new(Duration::from_secs(
            DEFAULT_RATE_LIMIT_BACKOFF_SECS,
        )));
        let ledger = Arc::new(CallLedger::new(Duration::from_secs(
            IMAGE_LOOKUP_COOLDOWN_SECS,
        )));
        let images = ImageResolver::new(primary.clone(), probe, ledger.clone(), gate.clone());

        let sweeper = match tokio::runtime::Handle::try_current() {
            Ok(_) => Some(spawn_sweeper(
                cache.clone(),
                ledger.clone(),
                Duration::from_secs(CACHE_SWEEP_INTERVAL_SECS),
            )),
            Err(_) => {
                tracing::warn!("No tokio runtime, expired cache entries will not be swept");
                None
            }
        };

        Self {
            primary_metrics: MetricsCollector::new(primary.provider_name()),
            secondary_metrics: MetricsCollector::new(secondary.provider_name()),
            primary,
            secondary,
            cache,
            gate,
            ledger,
            images,
            sweeper: Mutex::new(sweeper),
        }
    }

    /// Top assets by market cap
    ///
    /// Never empty: when both providers fail the built-in list is returned,
    /// truncated to `limit`. A `limit` of zero is treated as one.
    pub async fn list_top_assets(&self, currency: &str, limit: usize) -> Vec<AssetQuote> {
        let currency = currency.trim().to_lowercase();
        let limit = limit.max(1);

        let fetched = self
            .fetch_tiered(
                CacheKey::markets(self.primary.provider_name(), &currency, limit),
                CacheKey::markets(self.secondary.provider_name(), &currency, limit),
                None,
                || self.primary.fetch_markets(&currency, limit),
                || self.secondary.fetch_markets(&currency, limit),
            )
            .await;

        match fetched {
            Some(quotes) if !quotes.is_empty() => quotes,
            _ => {
                tracing::warn!(limit, "All providers failed, serving built-in asset list");
                fallback_quotes().into_iter().take(limit).collect()
            }
        }
    }

    /// A single asset, or `None` if no provider or built-in entry knows it
    pub async fn get_asset(&self, id: &str, currency: &str) -> Option<AssetQuote> {
        let id = id.trim().to_lowercase();
        let currency = currency.trim().to_lowercase();
        if id.is_empty() {
            return None;
        }

        let primary_key = CacheKey::asset(self.primary.provider_name(), &id, &currency);
        let secondary_key = CacheKey::asset(self.secondary.provider_name(), &id, &currency);

        if self.ledger.is_blacklisted(&id) {
            tracing::debug!(id = %id, "Identifier blacklisted, skipping providers");
            return self
                .cache
                .get_as::<AssetQuote>(&primary_key)
                .or_else(|| self.cache.get_as(&secondary_key))
                .or_else(|| builtin_quote(&id));
        }

        let fetched = self
            .fetch_tiered(
                primary_key,
                secondary_key,
                Some(id.as_str()),
                || self.primary.fetch_asset(&id, &currency),
                || self.secondary.fetch_asset(&id, &currency),
            )
            .await;

        fetched.or_else(|| builtin_quote(&id))
    }

    /// Free-text search, at most 15 matches
    ///
    /// An empty query returns immediately without a request.
    pub async fn search_assets(&self, query: &str) -> Vec<SearchMatch> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let mut matches = self
            .fetch_tiered(
                CacheKey::search(self.primary.provider_name(), query),
                CacheKey::search(self.secondary.provider_name(), query),
                None,
                || self.primary.search(query),
                || self.secondary.search(query),
            )
            .await
            .unwrap_or_default();

        matches.truncate(MAX_SEARCH_RESULTS);
        matches
    }

    /// Trending assets, empty when unavailable
    pub async fn trending_assets(&self) -> Vec<SearchMatch> {
        self.fetch_tiered(
            CacheKey::trending(self.primary.provider_name()),
            CacheKey::trending(self.secondary.provider_name()),
            None,
            || self.primary.trending(),
            || self.secondary.trending(),
        )
        .await
        .unwrap_or_default()
    }

    /// Image URL for an asset, returned without waiting on the network
    ///
    /// See [`ImageResolver::resolve`] for the resolution order.
    pub fn resolve_image_url(&self, id: &str) -> String {
        self.images.resolve(id)
    }

    /// Awaits image lookups started by [`resolve_image_url`](Self::resolve_image_url)
    pub async fn wait_for_image_lookups(&self) {
        self.images.wait_for_lookups().await
    }

    /// True if `id` will no longer be sent to any provider
    pub fn is_blacklisted(&self, id: &str) -> bool {
        self.ledger.is_blacklisted(&id.trim().to_lowercase())
    }

    /// True while the primary provider is suppressed after a 429
    pub fn is_rate_limited(&self) -> bool {
        self.gate.is_active()
    }

    /// Stops the cache sweep task
    pub fn shutdown(&self) {
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::info!("Stopped cache sweep task");
        }
    }

    /// Metrics for the primary and secondary providers
    pub async fn provider_metrics(&self) -> Vec<ProviderMetrics> {
        vec![
            self.primary_metrics.get_metrics().await,
            self.secondary_metrics.get_metrics().await,
        ]
    }

    /// Perform a health check on the market data client
    ///
    /// # Returns
    /// ComponentHealth indicating the status of the client and its providers
    pub async fn health_check(&self) -> ComponentHealth {
        let primary = self.primary_metrics.get_metrics().await;
        let gate_remaining = self.gate.remaining();
        let blacklisted = self.ledger.blacklist_len();

        let mut details = HashMap::new();
        details.insert(
            "primary_provider".to_string(),
            serde_json::json!(primary.provider_name),
        );
        details.insert(
            "primary_success_rate".to_string(),
            serde_json::json!(primary.success_rate),
        );
        details.insert(
            "rate_limit_remaining_secs".to_string(),
            serde_json::json!(gate_remaining.map(|d| d.as_secs())),
        );
        details.insert("blacklisted_ids".to_string(), serde_json::json!(blacklisted));
        details.insert(
            "tracked_ids".to_string(),
            serde_json::json!(self.ledger.tracked_len()),
        );
        details.insert("cache_entries".to_string(), serde_json::json!(self.cache.len()));

        let status = if primary.total_requests > 0 && primary.failed_requests == primary.total_requests
        {
            HealthStatus::Unhealthy
        } else if gate_remaining.is_some() || blacklisted > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy => "Market data client is serving live data".to_string(),
            HealthStatus::Degraded => match gate_remaining {
                Some(left) => format!(
                    "Primary provider rate limited for another {}s",
                    left.as_secs()
                ),
                None => format!("{} identifiers blacklisted", blacklisted),
            },
            HealthStatus::Unhealthy => {
                "Primary provider has failed every request, serving fallback data".to_string()
            }
        };

        ComponentHealth {
            name: "market_data_client".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: chrono::Utc::now(),
        }
    }

    /// Cache, then primary, then cached secondary, then live secondary
    async fn fetch_tiered<'a, T, P, S>(
        &self,
        primary_key: CacheKey,
        secondary_key: CacheKey,
        subject: Option<&str>,
        primary: P,
        secondary: S,
    ) -> Option<T>
    where
        T: Cacheable + Clone,
        P: Fn() -> BoxFuture<'a, Result<T, ProviderError>>,
        S: FnOnce() -> BoxFuture<'a, Result<T, ProviderError>>,
    {
        if let Some(hit) = self.cache.get_as::<T>(&primary_key) {
            return Some(hit);
        }

        match self.call_primary(subject, primary).await {
            Ok(value) => {
                self.cache.put(primary_key, value.clone());
                return Some(value);
            }
            Err(e) => tracing::warn!(
                provider = self.primary.provider_name(),
                error = %e,
                "Primary provider failed, falling back"
            ),
        }

        if let Some(hit) = self.cache.get_as::<T>(&secondary_key) {
            return Some(hit);
        }

        match self.call_secondary(secondary).await {
            Ok(value) => {
                self.cache.put(secondary_key, value.clone());
                Some(value)
            }
            Err(e) => {
                tracing::warn!(
                    provider = self.secondary.provider_name(),
                    error = %e,
                    "Secondary provider failed"
                );
                None
            }
        }
    }

    /// Calls the primary provider, honoring the gate and the retry policy
    ///
    /// `subject` is the asset identifier the call is about, if any; it is
    /// blacklisted on not-found and charged with an error on final failure.
    async fn call_primary<'a, T, P>(&self, subject: Option<&str>, op: P) -> Result<T, ProviderError>
    where
        P: Fn() -> BoxFuture<'a, Result<T, ProviderError>>,
    {
        if let Some(left) = self.gate.remaining() {
            tracing::debug!(remaining_secs = left.as_secs(), "Rate limit gate active");
            return Err(ProviderError::RateLimitExceeded {
                retry_after: Some(left),
            });
        }

        let mut attempt = 1;
        loop {
            let start = Instant::now();
            let result = op().await;
            let elapsed = start.elapsed();

            let err = match result {
                Ok(value) => {
                    self.primary_metrics
                        .record_request(elapsed, RequestOutcome::Success)
                        .await;
                    return Ok(value);
                }
                Err(e) => e,
            };

            if let ProviderError::RateLimitExceeded { retry_after } = err {
                self.primary_metrics
                    .record_request(elapsed, RequestOutcome::RateLimited)
                    .await;
                self.gate.trip(retry_after);
                return Err(ProviderError::RateLimitExceeded { retry_after });
            }

            self.primary_metrics
                .record_request(elapsed, RequestOutcome::Failure)
                .await;

            if err.is_not_found() {
                if let Some(id) = subject {
                    self.ledger.blacklist(id);
                }
                return Err(err);
            }

            if err.is_transient() && attempt < MAX_RETRY_ATTEMPTS {
                tracing::warn!(
                    attempt,
                    max_attempts = MAX_RETRY_ATTEMPTS,
                    error = %err,
                    "Primary request failed, retrying"
                );
                sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                attempt += 1;
                continue;
            }

            if let Some(id) = subject {
                self.ledger.record_error(id);
            }
            return Err(err);
        }
    }

    async fn call_secondary<'a, T, S>(&self, op: S) -> Result<T, ProviderError>
    where
        S: FnOnce() -> BoxFuture<'a, Result<T, ProviderError>>,
    {
        let start = Instant::now();
        let result = op().await;
        let outcome = match &result {
            Ok(_) => RequestOutcome::Success,
            Err(ProviderError::UnsupportedOperation(_)) => return result,
            Err(ProviderError::RateLimitExceeded { .. }) => RequestOutcome::RateLimited,
            Err(_) => RequestOutcome::Failure,
        };
        self.secondary_metrics
            .record_request(start.elapsed(), outcome)
            .await;
        result
    }
}

impl Drop for MarketDataClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Periodically drops expired cache entries and stale ledger attempts
///
/// The task runs until the returned handle is aborted.
fn spawn_sweeper(
    cache: Arc<ResponseCache>,
    ledger: Arc<CallLedger>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Starting cache sweep task");
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            let forgotten = ledger.purge_stale();
            if purged > 0 || forgotten > 0 {
                tracing::debug!(
                    purged,
                    forgotten,
                    remaining = cache.len(),
                    "Swept expired cache entries"
                );
            }
        }
    })
}

/// Built-in quote for `id`, if it is one of the fallback assets
fn builtin_quote(id: &str) -> Option<AssetQuote> {
    fallback_quotes().into_iter().find(|q| q.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::{guess_image_url, mock::MockProbe};
    use crate::provider::mock::{quote, search_match, MockFailure, MockProvider};

    struct Harness {
        primary: Arc<MockProvider>,
        secondary: Arc<MockProvider>,
        client: MarketDataClient,
    }

    fn harness() -> Harness {
        let primary = Arc::new(MockProvider::new("primary"));
        let secondary = Arc::new(MockProvider::new("secondary"));
        let client = MarketDataClient::with_providers(
            primary.clone(),
            secondary.clone(),
            Arc::new(MockProbe::default()),
        );
        Harness {
            primary,
            secondary,
            client,
        }
    }

    fn top_five() -> Vec<AssetQuote> {
        vec![
            quote("bitcoin", 67_000.0, 1.3e12),
            quote("ethereum", 3_500.0, 4.2e11),
            quote("tether", 1.0, 1.1e11),
            quote("binancecoin", 580.0, 8.5e10),
            quote("solana", 150.0, 7.0e10),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_list_served_from_cache() {
        let h = harness();
        h.primary.set_markets(top_five());

        let first = h.client.list_top_assets("usd", 5).await;
        let second = h.client.list_top_assets("USD", 5).await;
        assert_eq!(first, second);
        assert_eq!(h.primary.calls_to("markets"), 1);

        tokio::time::advance(Duration::from_secs(CACHE_TTL_SECS)).await;
        h.client.list_top_assets("usd", 5).await;
        assert_eq!(h.primary.calls_to("markets"), 2);
        assert_eq!(h.secondary.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_gate_suppresses_primary() {
        let h = harness();
        h.primary
            .fail_markets(MockFailure::RateLimited(Some(Duration::from_secs(30))));
        h.secondary.set_markets(vec![quote("bitcoin", 0.0, 0.0)]);

        let quotes = h.client.list_top_assets("usd", 5).await;
        assert_eq!(quotes.len(), 1);
        assert_eq!(h.primary.calls_to("markets"), 1);
        assert_eq!(h.secondary.calls_to("markets"), 1);
        assert!(h.client.is_rate_limited());

        // Primary untouched for every asset while the gate is closed
        let eth = h.client.get_asset("ethereum", "usd").await;
        assert_eq!(eth.map(|q| q.id), Some("ethereum".to_string()));
        assert_eq!(h.primary.call_count(), 1);
        assert_eq!(h.secondary.calls_to("asset:ethereum"), 1);

        tokio::time::advance(Duration::from_secs(30)).await;
        h.primary.set_markets(top_five());
        let quotes = h.client.list_top_assets("usd", 3).await;
        assert_eq!(quotes.len(), 3);
        assert_eq!(h.primary.calls_to("markets"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_without_hint_uses_default() {
        let h = harness();
        h.primary.fail_markets(MockFailure::RateLimited(None));

        h.client.list_top_assets("usd", 5).await;
        tokio::time::advance(Duration::from_secs(DEFAULT_RATE_LIMIT_BACKOFF_SECS - 1)).await;
        assert!(h.client.is_rate_limited());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!h.client.is_rate_limited());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retried_then_secondary() {
        let h = harness();
        h.primary.fail_markets(MockFailure::Api("HTTP 502".into()));
        h.secondary.set_markets(top_five());

        let start = Instant::now();
        let quotes = h.client.list_top_assets("usd", 5).await;

        assert_eq!(quotes.len(), 5);
        assert_eq!(h.primary.calls_to("markets"), MAX_RETRY_ATTEMPTS as usize);
        assert_eq!(h.secondary.calls_to("markets"), 1);
        assert!(start.elapsed() >= Duration::from_millis(RETRY_DELAY_MS * 2));
        assert!(!h.client.is_rate_limited());
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_serves_builtin_list() {
        let h = harness();

        let ids: Vec<_> = h
            .client
            .list_top_assets("usd", 5)
            .await
            .into_iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(
            ids,
            vec!["bitcoin", "ethereum", "solana", "cardano", "godsdollar"]
        );

        assert_eq!(h.client.list_top_assets("usd", 2).await.len(), 2);
        assert_eq!(h.client.list_top_assets("usd", 0).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_asset_is_blacklisted() {
        let h = harness();

        assert_eq!(h.client.get_asset("ghost-coin", "usd").await, None);
        assert_eq!(h.primary.calls_to("asset:ghost-coin"), 1);
        assert!(h.client.is_blacklisted("ghost-coin"));

        assert_eq!(h.client.get_asset("ghost-coin", "usd").await, None);
        assert_eq!(h.primary.calls_to("asset:ghost-coin"), 1);
        assert_eq!(h.secondary.calls_to("asset:ghost-coin"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blacklisted_asset_still_served_from_cache() {
        let h = harness();
        h.secondary.set_asset(quote("xyz", 2.0, 1e6));

        let first = h.client.get_asset("xyz", "usd").await;
        assert!(h.client.is_blacklisted("xyz"));
        let second = h.client.get_asset("xyz", "usd").await;

        assert_eq!(first.as_ref().map(|q| q.current_price), Some(2.0));
        assert_eq!(first, second);
        assert_eq!(h.primary.calls_to("asset:xyz"), 1);
        assert_eq!(h.secondary.calls_to("asset:xyz"), 1);

        // Once the entry expires the blacklist leaves nothing to serve
        tokio::time::advance(Duration::from_secs(CACHE_TTL_SECS)).await;
        assert_eq!(h.client.get_asset("xyz", "usd").await, None);
        assert_eq!(h.secondary.calls_to("asset:xyz"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_cache_and_ledger() {
        let h = harness();
        h.primary.set_markets(top_five());
        h.client.list_top_assets("usd", 5).await;
        assert!(h.client.ledger.try_begin("pepe"));

        tokio::time::sleep(Duration::from_secs(IMAGE_LOOKUP_COOLDOWN_SECS + 1)).await;
        assert_eq!(h.client.ledger.tracked_len(), 0);
        assert_eq!(h.client.cache.len(), 1);

        tokio::time::sleep(Duration::from_secs(CACHE_TTL_SECS - IMAGE_LOOKUP_COOLDOWN_SECS)).await;
        assert!(h.client.cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blacklisted_image_never_hits_provider() {
        let h = harness();
        h.client.get_asset("ghost-coin", "usd").await;
        assert!(h.client.is_blacklisted("ghost-coin"));

        let url = h.client.resolve_image_url("ghost-coin");
        assert_eq!(url, guess_image_url("ghost-coin"));
        h.client.wait_for_image_lookups().await;

        tokio::time::advance(Duration::from_secs(IMAGE_LOOKUP_COOLDOWN_SECS * 10)).await;
        h.client.resolve_image_url("ghost-coin");
        h.client.wait_for_image_lookups().await;

        assert_eq!(h.primary.calls_to("asset:ghost-coin"), 1);
        assert!(h
            .client
            .resolve_image_url("ghost-coin")
            .starts_with("data:image/svg+xml;base64,"));
    }

    #[tokio::test]
    async fn test_bitcoin_image_is_local() {
        let h = harness();
        assert_eq!(
            h.client.resolve_image_url("bitcoin"),
            "/assets/crypto/bitcoin.png"
        );
        h.client.wait_for_image_lookups().await;
        assert_eq!(h.primary.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_asset_cached_and_builtin() {
        let h = harness();
        h.primary.set_asset(quote("solana", 150.0, 7.0e10));

        let sol = h.client.get_asset("solana", "usd").await;
        h.client.get_asset("solana", "usd").await;
        assert_eq!(sol.map(|q| q.current_price), Some(150.0));
        assert_eq!(h.primary.calls_to("asset:solana"), 1);

        h.primary
            .fail_asset("godsdollar", MockFailure::Api("HTTP 500".into()));
        h.secondary
            .fail_asset("godsdollar", MockFailure::Api("HTTP 500".into()));
        let gd = h.client.get_asset("godsdollar", "usd").await;
        assert_eq!(gd.map(|q| q.name), Some("God's Dollar".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_asset_errors_blacklist() {
        let h = harness();
        h.primary
            .fail_asset("flaky", MockFailure::Api("HTTP 500".into()));

        for _ in 0..3 {
            h.client.get_asset("flaky", "usd").await;
        }
        assert!(h.client.is_blacklisted("flaky"));
        assert_eq!(
            h.primary.calls_to("asset:flaky"),
            3 * MAX_RETRY_ATTEMPTS as usize
        );
    }

    #[tokio::test]
    async fn test_empty_search_issues_no_request() {
        let h = harness();
        assert!(h.client.search_assets("").await.is_empty());
        assert!(h.client.search_assets("   ").await.is_empty());
        assert_eq!(h.primary.call_count() + h.secondary.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_capped_and_falls_back() {
        let h = harness();
        let many: Vec<_> = (0..20).map(|i| search_match(&format!("coin-{}", i))).collect();
        h.primary.set_search(many);
        assert_eq!(h.client.search_assets("coin").await.len(), MAX_SEARCH_RESULTS);

        let h = harness();
        h.secondary.set_search(vec![search_match("godsdollar")]);
        let matches = h.client.search_assets("gods").await;
        assert_eq!(matches.len(), 1);
        assert_eq!(h.primary.calls_to("search:gods"), MAX_RETRY_ATTEMPTS as usize);

        let h = harness();
        assert!(h.client.search_assets("nothing").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trending_cached() {
        let h = harness();
        h.primary.set_trending(vec![search_match("pepe")]);

        assert_eq!(h.client.trending_assets().await.len(), 1);
        assert_eq!(h.client.trending_assets().await.len(), 1);
        assert_eq!(h.primary.calls_to("trending"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_reflects_gate() {
        let h = harness();
        h.primary.set_markets(top_five());
        h.client.list_top_assets("usd", 5).await;
        assert_eq!(h.client.health_check().await.status, HealthStatus::Healthy);

        h.primary.fail_markets(MockFailure::RateLimited(None));
        h.client.list_top_assets("usd", 4).await;
        let health = h.client.health_check().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(
            health.details["rate_limit_remaining_secs"],
            serde_json::json!(DEFAULT_RATE_LIMIT_BACKOFF_SECS)
        );

        let metrics = h.client.provider_metrics().await;
        assert_eq!(metrics[0].rate_limited_requests, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_sweeper() {
        let h = harness();
        assert!(h.client.sweeper.lock().unwrap().is_some());
        h.client.shutdown();
        assert!(h.client.sweeper.lock().unwrap().is_none());
    }
}
