//! Provider abstraction for fetching market data from external APIs

use crate::{
    error::ProviderError,
    types::{AssetQuote, SearchMatch},
};
use async_trait::async_trait;

/// Trait for market data providers
///
/// The client consults providers in priority order. Operations a provider
/// has no endpoint for return [`ProviderError::UnsupportedOperation`].
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetches the top assets by market cap
    ///
    /// # Arguments
    /// * `currency` - Quote currency (e.g. "usd")
    /// * `limit` - Number of assets to return
    async fn fetch_markets(
        &self,
        currency: &str,
        limit: usize,
    ) -> Result<Vec<AssetQuote>, ProviderError>;

    /// Fetches a single asset by provider identifier
    ///
    /// Unknown identifiers yield [`ProviderError::NotFound`].
    async fn fetch_asset(&self, id: &str, currency: &str) -> Result<AssetQuote, ProviderError>;

    /// Free-text search over the provider's asset catalogue
    async fn search(&self, _query: &str) -> Result<Vec<SearchMatch>, ProviderError> {
        Err(ProviderError::UnsupportedOperation(self.provider_name()))
    }

    /// Currently trending assets
    async fn trending(&self) -> Result<Vec<SearchMatch>, ProviderError> {
        Err(ProviderError::UnsupportedOperation(self.provider_name()))
    }

    /// Looks up the canonical image URL for an asset
    async fn fetch_image_url(&self, id: &str) -> Result<String, ProviderError> {
        let quote = self.fetch_asset(id, "usd").await?;
        if quote.image.is_empty() {
            return Err(ProviderError::InvalidResponse(format!(
                "{} returned no image for {}",
                self.provider_name(),
                id
            )));
        }
        Ok(quote.image)
    }

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}
