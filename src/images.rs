//! Asset image resolution
//!
//! Resolution order for an identifier:
//!
//! ```text
//! cached resolution
//!     ↓
//! local asset table (bundled with the site)
//!     ↓
//! known CoinGecko CDN ids
//!     ↓
//! best-guess CDN URL, returned immediately
//!     └─ background: provider lookup ∥ probe guess + alternates → placeholder
//! ```
//!
//! Resolution never fails; the worst case is a generated letter avatar.

use crate::{
    constants::{
        ALTERNATE_IMAGE_URL_PATTERNS, COINGECKO_IMAGE_CDN, COINGECKO_IMAGE_IDS,
        GUESS_IMAGE_URL_PATTERN, IMAGE_PROBE_TIMEOUT_SECS, LOCAL_ASSET_IMAGES,
        PLACEHOLDER_COLORS, USER_AGENT,
    },
    error::ProviderError,
    ledger::{CallLedger, RateLimitGate},
    provider::MarketDataProvider,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Where a cached image URL came from, in increasing precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImageSource {
    Placeholder,
    Probed,
    Provider,
}

#[derive(Debug, Clone)]
struct ResolvedImage {
    url: String,
    source: ImageSource,
}

/// Checks whether a URL serves a loadable image
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn probe(&self, url: &str) -> bool;
}

/// Probe that issues a GET and inspects status and content type
pub struct HttpImageProbe {
    client: Client,
}

impl HttpImageProbe {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(IMAGE_PROBE_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::NetworkError)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn probe(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => {
                let is_image = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map_or(true, |ct| ct.starts_with("image/"));
                response.status().is_success() && is_image
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "Image probe failed");
                false
            }
        }
    }
}

/// Image URL for identifiers covered by the fixed tables
pub fn fixed_image_url(id: &str) -> Option<String> {
    if let Some((_, path)) = LOCAL_ASSET_IMAGES.iter().find(|(known, _)| *known == id) {
        return Some(path.to_string());
    }
    COINGECKO_IMAGE_IDS
        .iter()
        .find(|(known, _, _)| *known == id)
        .map(|(_, num, file)| format!("{}/{}/large/{}", COINGECKO_IMAGE_CDN, num, file))
}

/// Best-guess CDN URL returned before anything is known about `id`
pub fn guess_image_url(id: &str) -> String {
    GUESS_IMAGE_URL_PATTERN.replace("{id}", id)
}

/// Guess followed by every alternate pattern, in probe order
pub fn candidate_urls(id: &str) -> Vec<String> {
    std::iter::once(guess_image_url(id))
        .chain(
            ALTERNATE_IMAGE_URL_PATTERNS
                .iter()
                .map(|pattern| pattern.replace("{id}", id)),
        )
        .collect()
}

/// Generates an SVG letter avatar as a base64 data URI
pub fn placeholder_image(id: &str) -> String {
    let letter = id
        .chars()
        .find(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('?');
    let hash = id.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    let color = PLACEHOLDER_COLORS[hash % PLACEHOLDER_COLORS.len()];

    let svg = format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="64" height="64" viewBox="0 0 64 64">"#,
            r#"<circle cx="32" cy="32" r="32" fill="{}"/>"#,
            r#"<text x="50%" y="50%" dy=".35em" text-anchor="middle" "#,
            r##"font-family="Arial, sans-serif" font-size="28" font-weight="bold" fill="#FFFFFF">{}</text>"##,
            "</svg>"
        ),
        color, letter
    );

    format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

/// Resolves display images for asset identifiers
///
/// Cheap to clone; clones share the cache, ledger and in-flight task list.
#[derive(Clone)]
pub struct ImageResolver {
    resolved: Arc<RwLock<HashMap<String, ResolvedImage>>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    provider: Arc<dyn MarketDataProvider>,
    probe: Arc<dyn ImageProbe>,
    ledger: Arc<CallLedger>,
    gate: Arc<RateLimitGate>,
}

impl ImageResolver {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        probe: Arc<dyn ImageProbe>,
        ledger: Arc<CallLedger>,
        gate: Arc<RateLimitGate>,
    ) -> Self {
        Self {
            resolved: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            tasks: Arc::new(Mutex::new(Vec::new())),
            provider,
            probe,
            ledger,
            gate,
        }
    }

    /// Returns an image URL for `id` without waiting on the network
    ///
    /// Unknown identifiers get a guessed URL now and a background lookup
    /// that improves the cached answer for the next call.
    pub fn resolve(&self, id: &str) -> String {
        let id = id.trim().to_lowercase();
        if id.is_empty() {
            return placeholder_image("?");
        }

        if let Some(cached) = self.cached(&id) {
            return cached.url;
        }
        if let Some(url) = fixed_image_url(&id) {
            return url;
        }

        self.spawn_lookup(&id);
        guess_image_url(&id)
    }

    /// Cached URL and its origin, if any
    pub fn cached_source(&self, id: &str) -> Option<(String, ImageSource)> {
        self.cached(id).map(|r| (r.url, r.source))
    }

    /// Runs the provider lookup and the probe chain for `id` concurrently
    pub async fn lookup(&self, id: &str) {
        futures::join!(self.lookup_provider(id), self.probe_candidates(id));
    }

    /// Awaits every background lookup spawned so far
    pub async fn wait_for_lookups(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = {
                let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
                tasks.drain(..).collect()
            };
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "Image lookup task failed");
                }
            }
        }
    }

    fn spawn_lookup(&self, id: &str) {
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if !in_flight.insert(id.to_string()) {
                return;
            }
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(id, "No runtime available, skipping image lookup");
            self.finish(id);
            return;
        };

        let resolver = self.clone();
        let owned_id = id.to_string();
        let handle = runtime.spawn(async move {
            resolver.lookup(&owned_id).await;
            resolver.finish(&owned_id);
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    fn finish(&self, id: &str) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    async fn lookup_provider(&self, id: &str) {
        if self.gate.is_active() {
            tracing::debug!(id, "Rate limit gate active, skipping image lookup");
            return;
        }
        if !self.ledger.try_begin(id) {
            return;
        }

        match self.provider.fetch_image_url(id).await {
            Ok(url) => {
                tracing::debug!(id, url = %url, "Discovered image from provider");
                self.store(id, url, ImageSource::Provider);
            }
            Err(ProviderError::RateLimitExceeded { retry_after }) => self.gate.trip(retry_after),
            Err(e) if e.is_not_found() => self.ledger.blacklist(id),
            Err(e) => {
                tracing::warn!(
                    id,
                    provider = self.provider.provider_name(),
                    error = %e,
                    "Image lookup failed"
                );
                self.ledger.record_error(id);
            }
        }
    }

    async fn probe_candidates(&self, id: &str) {
        for url in candidate_urls(id) {
            if self.probe.probe(&url).await {
                self.store(id, url, ImageSource::Probed);
                return;
            }
        }
        tracing::debug!(id, "No image candidate loaded, using placeholder");
        self.store(id, placeholder_image(id), ImageSource::Placeholder);
    }

    fn cached(&self, id: &str) -> Option<ResolvedImage> {
        self.resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Writes unless a higher-precedence resolution is already cached
    fn store(&self, id: &str, url: String, source: ImageSource) {
        let mut resolved = self.resolved.write().unwrap_or_else(PoisonError::into_inner);
        if resolved.get(id).is_some_and(|existing| existing.source > source) {
            return;
        }
        resolved.insert(id.to_string(), ResolvedImage { url, source });
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockProbe;
    use super::*;
    use crate::constants::{DEFAULT_RATE_LIMIT_BACKOFF_SECS, IMAGE_LOOKUP_COOLDOWN_SECS};
    use crate::provider::mock::{quote, MockFailure, MockProvider};

    fn resolver(provider: Arc<MockProvider>, probe: Arc<MockProbe>) -> ImageResolver {
        ImageResolver::new(
            provider,
            probe,
            Arc::new(CallLedger::new(Duration::from_secs(IMAGE_LOOKUP_COOLDOWN_SECS))),
            Arc::new(RateLimitGate::new(Duration::from_secs(
                DEFAULT_RATE_LIMIT_BACKOFF_SECS,
            ))),
        )
    }

    #[test]
    fn test_fixed_tables() {
        assert_eq!(
            fixed_image_url("bitcoin").as_deref(),
            Some("/assets/crypto/bitcoin.png")
        );
        assert_eq!(
            fixed_image_url("dogecoin").as_deref(),
            Some("https://assets.coingecko.com/coins/images/5/large/dogecoin.png")
        );
        assert!(fixed_image_url("unknown-coin").is_none());
    }

    #[test]
    fn test_candidates_start_with_guess() {
        let candidates = candidate_urls("pepe");
        assert_eq!(candidates[0], guess_image_url("pepe"));
        assert_eq!(candidates.len(), 1 + ALTERNATE_IMAGE_URL_PATTERNS.len());
        assert!(candidates.iter().all(|url| url.contains("pepe")));
    }

    #[test]
    fn test_placeholder_is_svg_data_uri() {
        let uri = placeholder_image("pepe");
        let encoded = uri.strip_prefix("data:image/svg+xml;base64,").unwrap();
        let svg = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert!(svg.contains(">P</text>"));
        // Stable color per identifier
        assert_eq!(uri, placeholder_image("pepe"));
    }

    #[tokio::test]
    async fn test_local_asset_needs_no_lookup() {
        let provider = Arc::new(MockProvider::new("primary"));
        let probe = Arc::new(MockProbe::default());
        let images = resolver(provider.clone(), probe.clone());

        assert_eq!(images.resolve("Bitcoin"), "/assets/crypto/bitcoin.png");
        images.wait_for_lookups().await;
        assert_eq!(provider.call_count(), 0);
        assert!(probe.probed().is_empty());
    }

    #[tokio::test]
    async fn test_provider_image_beats_probe() {
        let provider = Arc::new(MockProvider::new("primary"));
        provider.set_asset(quote("pepe", 0.00001, 4e9));
        let probe = Arc::new(MockProbe::default());
        probe.allow(&guess_image_url("pepe"));
        let images = resolver(provider.clone(), probe.clone());

        assert_eq!(images.resolve("pepe"), guess_image_url("pepe"));
        images.wait_for_lookups().await;

        assert_eq!(images.resolve("pepe"), "https://img.example/pepe.png");
        assert_eq!(
            images.cached_source("pepe").map(|(_, s)| s),
            Some(ImageSource::Provider)
        );
    }

    #[tokio::test]
    async fn test_probe_falls_through_to_alternate() {
        let provider = Arc::new(MockProvider::new("primary"));
        provider.fail_asset("bonk", MockFailure::Api("HTTP 500".into()));
        let probe = Arc::new(MockProbe::default());
        let second = candidate_urls("bonk")[2].clone();
        probe.allow(&second);
        let images = resolver(provider, probe.clone());

        images.lookup("bonk").await;

        assert_eq!(images.resolve("bonk"), second);
        assert_eq!(probe.probed().len(), 3);
    }

    #[tokio::test]
    async fn test_not_found_blacklists_and_placeholder_is_used() {
        let provider = Arc::new(MockProvider::new("primary"));
        let probe = Arc::new(MockProbe::default());
        let images = resolver(provider.clone(), probe);

        images.resolve("ghost-coin");
        images.wait_for_lookups().await;
        assert_eq!(provider.calls_to("asset:ghost-coin"), 1);
        assert!(images.ledger.is_blacklisted("ghost-coin"));

        assert_eq!(images.resolve("ghost-coin"), placeholder_image("ghost-coin"));
        images.lookup("ghost-coin").await;
        assert_eq!(provider.calls_to("asset:ghost-coin"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_limits_provider_lookups() {
        let provider = Arc::new(MockProvider::new("primary"));
        provider.fail_asset("slow", MockFailure::Api("HTTP 503".into()));
        let images = resolver(provider.clone(), Arc::new(MockProbe::default()));

        images.lookup("slow").await;
        images.lookup("slow").await;
        assert_eq!(provider.calls_to("asset:slow"), 1);

        tokio::time::advance(Duration::from_secs(IMAGE_LOOKUP_COOLDOWN_SECS)).await;
        images.lookup("slow").await;
        assert_eq!(provider.calls_to("asset:slow"), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_trips_gate() {
        let provider = Arc::new(MockProvider::new("primary"));
        provider.fail_asset("wif", MockFailure::RateLimited(None));
        let images = resolver(provider.clone(), Arc::new(MockProbe::default()));

        images.lookup("wif").await;
        assert!(images.gate.is_active());
        assert!(!images.ledger.is_blacklisted("wif"));

        images.lookup("other").await;
        assert_eq!(provider.calls_to("asset:other"), 0);
    }
}
