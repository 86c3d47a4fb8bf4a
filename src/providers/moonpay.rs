//! MoonPay provider (secondary tier)
//!
//! MoonPay is an on-ramp, not a market data source. Its currency listing is
//! repurposed as a degraded quote source: names, codes and icons are real,
//! while numeric market fields are mapped best-effort and default to zero.

use crate::{
    config::ClientConfig,
    constants::USER_AGENT,
    error::ProviderError,
    provider::MarketDataProvider,
    providers::coingecko::check_status,
    types::{fallback_quotes, AssetQuote, SearchMatch},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Currency entry from `/v3/currencies`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoonPayCurrency {
    code: String,
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    price_change_24h: Option<f64>,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    volume_24h: Option<f64>,
}

impl MoonPayCurrency {
    fn into_quote(self) -> AssetQuote {
        let code = self.code.to_lowercase();
        AssetQuote {
            id: id_for_code(&code),
            image: self.icon.unwrap_or_default(),
            current_price: self.price.unwrap_or(0.0),
            price_change_percentage_24h: self.price_change_24h.unwrap_or(0.0),
            market_cap: self.market_cap.unwrap_or(0.0),
            total_volume: self.volume_24h.unwrap_or(0.0),
            ..AssetQuote::new(String::new(), code, self.name)
        }
    }

    fn is_crypto(&self) -> bool {
        self.kind.as_deref().map_or(true, |k| k == "crypto")
    }
}

/// Maps a currency code to the CoinGecko-style identifier when known
fn id_for_code(code: &str) -> String {
    fallback_quotes()
        .into_iter()
        .find(|q| q.symbol == code)
        .map(|q| q.id)
        .unwrap_or_else(|| code.to_string())
}

/// Maps a CoinGecko-style identifier to a MoonPay currency code
fn code_for_id(id: &str) -> String {
    if let Some(quote) = fallback_quotes().into_iter().find(|q| q.id == id) {
        return quote.symbol;
    }
    KNOWN_CODES
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| id.to_string())
}

const KNOWN_CODES: &[(&str, &str)] = &[
    ("binancecoin", "bnb"),
    ("tether", "usdt"),
    ("usd-coin", "usdc"),
    ("ripple", "xrp"),
    ("dogecoin", "doge"),
    ("polkadot", "dot"),
    ("litecoin", "ltc"),
    ("matic-network", "matic"),
    ("avalanche-2", "avax"),
];

/// MoonPay currency-listing provider
pub struct MoonPayProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl MoonPayProvider {
    /// Creates a new MoonPay provider
    pub fn new(config: &ClientConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.secondary_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::NetworkError)?;

        Ok(Self {
            client,
            base_url: config.moonpay_base_url.trim_end_matches('/').to_string(),
            api_key: config.moonpay_api_key.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        subject: &str,
    ) -> Result<T, ProviderError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(ProviderError::UnsupportedOperation("moonpay (no API key)"))?;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Requesting MoonPay");

        let response = self
            .client
            .get(&url)
            .query(query)
            .header(reqwest::header::AUTHORIZATION, format!("Api-Key {}", api_key))
            .send()
            .await
            .map_err(ProviderError::from_request)?;
        let response = check_status(response, subject).await?;
        let text = response.text().await.map_err(ProviderError::from_request)?;

        serde_json::from_str(&text).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse MoonPay response: {}. Response: {}",
                e, text
            ))
        })
    }

    async fn list_currencies(&self, limit: usize) -> Result<Vec<MoonPayCurrency>, ProviderError> {
        let limit = limit.to_string();
        let currencies: Vec<MoonPayCurrency> = self
            .get_json(
                "/v3/currencies",
                &[("type", "crypto"), ("limit", limit.as_str()), ("sort", "market_cap")],
                "currencies",
            )
            .await?;

        Ok(currencies.into_iter().filter(|c| c.is_crypto()).collect())
    }
}

#[async_trait]
impl MarketDataProvider for MoonPayProvider {
    async fn fetch_markets(
        &self,
        _currency: &str,
        limit: usize,
    ) -> Result<Vec<AssetQuote>, ProviderError> {
        let mut quotes: Vec<AssetQuote> = self
            .list_currencies(limit)
            .await?
            .into_iter()
            .map(MoonPayCurrency::into_quote)
            .collect();

        if quotes.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "No currencies returned from MoonPay".to_string(),
            ));
        }

        // Stable sort keeps MoonPay's order when caps are all zero
        quotes.sort_by(|a, b| {
            b.market_cap
                .partial_cmp(&a.market_cap)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        quotes.truncate(limit);
        for (rank, quote) in quotes.iter_mut().enumerate() {
            quote.market_cap_rank = Some(rank as u32 + 1);
        }

        Ok(quotes)
    }

    async fn fetch_asset(&self, id: &str, _currency: &str) -> Result<AssetQuote, ProviderError> {
        let code = code_for_id(id);
        let currency: MoonPayCurrency = self
            .get_json(&format!("/v3/currencies/{}", code), &[], id)
            .await?;

        let mut quote = currency.into_quote();
        quote.id = id.to_string();
        Ok(quote)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchMatch>, ProviderError> {
        let needle = query.to_lowercase();
        let matches = self
            .list_currencies(500)
            .await?
            .into_iter()
            .filter(|c| {
                c.code.to_lowercase().contains(&needle) || c.name.to_lowercase().contains(&needle)
            })
            .map(|c| {
                let code = c.code.to_lowercase();
                SearchMatch {
                    id: id_for_code(&code),
                    name: c.name,
                    symbol: code,
                    market_cap_rank: None,
                    thumb: c.icon,
                }
            })
            .collect();

        Ok(matches)
    }

    fn provider_name(&self) -> &'static str {
        "moonpay"
    }
}
