//! Runtime configuration
//!
//! Everything except API keys and endpoint overrides is a constant. Missing
//! keys are not an error: the corresponding authenticated path is simply
//! skipped.

use crate::constants::{
    COINGECKO_API_KEY_ENV, COINGECKO_API_URL, MOONPAY_API_KEY_ENV, MOONPAY_API_URL,
    MOONPAY_WIDGET_URL, REQUEST_TIMEOUT_SECS, SECONDARY_REQUEST_TIMEOUT_SECS,
};
use std::time::Duration;

/// Settings for the market data client and its providers
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// CoinGecko API key, sent as a header when present
    pub coingecko_api_key: Option<String>,
    /// MoonPay API key; without it the secondary provider is disabled
    pub moonpay_api_key: Option<String>,
    pub coingecko_base_url: String,
    pub moonpay_base_url: String,
    pub moonpay_widget_url: String,
    /// Timeout for primary list/detail calls
    pub request_timeout: Duration,
    /// Timeout for secondary calls
    pub secondary_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            coingecko_api_key: None,
            moonpay_api_key: None,
            coingecko_base_url: COINGECKO_API_URL.to_string(),
            moonpay_base_url: MOONPAY_API_URL.to_string(),
            moonpay_widget_url: MOONPAY_WIDGET_URL.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            secondary_timeout: Duration::from_secs(SECONDARY_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Reads API keys from `COINGECKO_API_KEY` and `MOONPAY_API_KEY`
    pub fn from_env() -> Self {
        let config = Self {
            coingecko_api_key: read_key(COINGECKO_API_KEY_ENV),
            moonpay_api_key: read_key(MOONPAY_API_KEY_ENV),
            ..Self::default()
        };

        tracing::debug!(
            coingecko_key = config.coingecko_api_key.is_some(),
            moonpay_key = config.moonpay_api_key.is_some(),
            "Loaded market data configuration"
        );

        config
    }
}

fn read_key(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts_match() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.secondary_timeout, config.request_timeout);
        assert!(config.coingecko_api_key.is_none());
    }

    #[test]
    fn test_blank_key_is_absent() {
        std::env::set_var("GD_TEST_BLANK_KEY", "   ");
        assert_eq!(read_key("GD_TEST_BLANK_KEY"), None);
        std::env::set_var("GD_TEST_SET_KEY", " abc ");
        assert_eq!(read_key("GD_TEST_SET_KEY").as_deref(), Some("abc"));
    }
}
