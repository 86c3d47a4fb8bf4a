//! CoinGecko market data provider (primary tier)

use crate::{
    config::ClientConfig,
    constants::{COINGECKO_API_KEY_HEADER, USER_AGENT},
    error::ProviderError,
    provider::MarketDataProvider,
    types::{AssetQuote, SearchMatch},
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Row of the `/coins/markets` response
///
/// CoinGecko reports `null` for numbers it does not know.
#[derive(Debug, Deserialize)]
struct MarketRow {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    image: Option<String>,
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
    high_24h: Option<f64>,
    low_24h: Option<f64>,
    market_cap_rank: Option<u32>,
}

impl From<MarketRow> for AssetQuote {
    fn from(row: MarketRow) -> Self {
        Self {
            id: row.id,
            symbol: row.symbol,
            name: row.name,
            image: row.image.unwrap_or_default(),
            current_price: row.current_price.unwrap_or(0.0),
            price_change_percentage_24h: row.price_change_percentage_24h.unwrap_or(0.0),
            market_cap: row.market_cap.unwrap_or(0.0),
            total_volume: row.total_volume.unwrap_or(0.0),
            high_24h: row.high_24h,
            low_24h: row.low_24h,
            market_cap_rank: row.market_cap_rank,
        }
    }
}

/// `/coins/{id}` response, trimmed to the fields we map
#[derive(Debug, Deserialize)]
struct CoinDetail {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    image: Option<CoinImages>,
    market_cap_rank: Option<u32>,
    #[serde(default)]
    market_data: Option<CoinMarketData>,
}

#[derive(Debug, Deserialize)]
struct CoinImages {
    large: Option<String>,
    small: Option<String>,
    thumb: Option<String>,
}

type CurrencyValues = HashMap<String, Option<f64>>;

#[derive(Debug, Default, Deserialize)]
struct CoinMarketData {
    #[serde(default)]
    current_price: CurrencyValues,
    #[serde(default)]
    market_cap: CurrencyValues,
    #[serde(default)]
    total_volume: CurrencyValues,
    #[serde(default)]
    high_24h: CurrencyValues,
    #[serde(default)]
    low_24h: CurrencyValues,
    price_change_percentage_24h: Option<f64>,
}

impl CoinDetail {
    fn image_url(&self) -> Option<String> {
        self.image
            .as_ref()
            .and_then(|i| i.large.clone().or_else(|| i.small.clone()).or_else(|| i.thumb.clone()))
    }

    fn into_quote(self, currency: &str) -> AssetQuote {
        let image = self.image_url().unwrap_or_default();
        let data = self.market_data.unwrap_or_default();
        let pick = |values: &CurrencyValues| values.get(currency).copied().flatten();

        AssetQuote {
            current_price: pick(&data.current_price).unwrap_or(0.0),
            price_change_percentage_24h: data.price_change_percentage_24h.unwrap_or(0.0),
            market_cap: pick(&data.market_cap).unwrap_or(0.0),
            total_volume: pick(&data.total_volume).unwrap_or(0.0),
            high_24h: pick(&data.high_24h),
            low_24h: pick(&data.low_24h),
            market_cap_rank: self.market_cap_rank,
            image,
            ..AssetQuote::new(self.id, self.symbol, self.name)
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<SearchCoin>,
}

#[derive(Debug, Deserialize)]
struct SearchCoin {
    id: String,
    name: String,
    symbol: String,
    market_cap_rank: Option<u32>,
    #[serde(default)]
    thumb: Option<String>,
}

impl From<SearchCoin> for SearchMatch {
    fn from(coin: SearchCoin) -> Self {
        Self {
            id: coin.id,
            name: coin.name,
            symbol: coin.symbol,
            market_cap_rank: coin.market_cap_rank,
            thumb: coin.thumb,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    #[serde(default)]
    coins: Vec<TrendingEntry>,
}

#[derive(Debug, Deserialize)]
struct TrendingEntry {
    item: SearchCoin,
}

/// CoinGecko market data provider
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoProvider {
    /// Creates a new CoinGecko provider
    pub fn new(config: &ClientConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::NetworkError)?;

        Ok(Self {
            client,
            base_url: config.coingecko_base_url.trim_end_matches('/').to_string(),
            api_key: config.coingecko_api_key.clone(),
        })
    }

    /// Sends a GET and decodes the JSON body, mapping HTTP failures
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        subject: &str,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Requesting CoinGecko");

        let mut request = self.client.get(&url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header(COINGECKO_API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(ProviderError::from_request)?;
        let response = check_status(response, subject).await?;
        let text = response.text().await.map_err(ProviderError::from_request)?;

        serde_json::from_str(&text).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse CoinGecko response: {}. Response: {}",
                e, text
            ))
        })
    }
}

/// Maps non-success statuses onto provider errors
pub(crate) async fn check_status(response: Response, subject: &str) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.as_u16() == 429 {
        return Err(ProviderError::RateLimitExceeded {
            retry_after: retry_after(&response),
        });
    }
    if status.as_u16() == 404 {
        return Err(ProviderError::NotFound(subject.to_string()));
    }
    if !status.is_success() {
        return Err(ProviderError::ApiError(format!(
            "HTTP {}: {}",
            status,
            response.text().await.unwrap_or_default()
        )));
    }
    Ok(response)
}

/// Reads a `Retry-After` hint given in seconds
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    async fn fetch_markets(
        &self,
        currency: &str,
        limit: usize,
    ) -> Result<Vec<AssetQuote>, ProviderError> {
        let per_page = limit.to_string();
        let rows: Vec<MarketRow> = self
            .get_json(
                "/coins/markets",
                &[
                    ("vs_currency", currency),
                    ("order", "market_cap_desc"),
                    ("per_page", per_page.as_str()),
                    ("page", "1"),
                    ("sparkline", "false"),
                    ("price_change_percentage", "24h"),
                ],
                "markets",
            )
            .await?;

        if rows.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "No markets returned from CoinGecko".to_string(),
            ));
        }

        tracing::debug!(count = rows.len(), "Fetched markets from CoinGecko");
        Ok(rows.into_iter().map(AssetQuote::from).collect())
    }

    async fn fetch_asset(&self, id: &str, currency: &str) -> Result<AssetQuote, ProviderError> {
        let detail: CoinDetail = self
            .get_json(
                &format!("/coins/{}", id),
                &[
                    ("localization", "false"),
                    ("tickers", "false"),
                    ("community_data", "false"),
                    ("developer_data", "false"),
                ],
                id,
            )
            .await?;

        Ok(detail.into_quote(currency))
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchMatch>, ProviderError> {
        let response: SearchResponse = self.get_json("/search", &[("query", query)], query).await?;
        Ok(response.coins.into_iter().map(SearchMatch::from).collect())
    }

    async fn trending(&self) -> Result<Vec<SearchMatch>, ProviderError> {
        let response: TrendingResponse = self.get_json("/search/trending", &[], "trending").await?;
        Ok(response
            .coins
            .into_iter()
            .map(|entry| SearchMatch::from(entry.item))
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}
