//! MoonPay buy widget URL
//!
//! The widget is opened by the caller in a new window; nothing comes back
//! to this crate.

use crate::{config::ClientConfig, error::WidgetError};
use reqwest::Url;

/// Parameters for a buy widget session
#[derive(Debug, Clone, Default)]
pub struct OnRampWidget {
    /// Crypto currency to buy (e.g. "eth")
    pub currency_code: String,
    /// Fiat currency paid with
    pub base_currency_code: Option<String>,
    pub base_currency_amount: Option<f64>,
    pub email: Option<String>,
    pub wallet_address: Option<String>,
    /// Accent color as `#RRGGBB`
    pub color_code: Option<String>,
    pub redirect_url: Option<String>,
    /// Restricts the currencies offered in the widget
    pub show_only_currencies: Vec<String>,
    pub language: Option<String>,
}

impl OnRampWidget {
    pub fn new(currency_code: impl Into<String>) -> Self {
        Self {
            currency_code: currency_code.into(),
            base_currency_code: Some("usd".to_string()),
            ..Self::default()
        }
    }

    /// Builds the widget URL, failing if no on-ramp API key is configured
    pub fn url(&self, config: &ClientConfig) -> Result<Url, WidgetError> {
        let api_key = config
            .moonpay_api_key
            .as_deref()
            .ok_or(WidgetError::MissingApiKey)?;

        let mut url = Url::parse(&config.moonpay_widget_url)
            .map_err(|e| WidgetError::InvalidUrl(format!("{}: {}", config.moonpay_widget_url, e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("apiKey", api_key);
            query.append_pair("currencyCode", &self.currency_code.to_lowercase());

            if let Some(code) = &self.base_currency_code {
                query.append_pair("baseCurrencyCode", &code.to_lowercase());
            }
            if let Some(amount) = self.base_currency_amount {
                query.append_pair("baseCurrencyAmount", &amount.to_string());
            }
            if let Some(email) = &self.email {
                query.append_pair("email", email);
            }
            if let Some(address) = &self.wallet_address {
                query.append_pair("walletAddress", address);
            }
            if let Some(color) = &self.color_code {
                query.append_pair("colorCode", color);
            }
            if let Some(redirect) = &self.redirect_url {
                query.append_pair("redirectURL", redirect);
            }
            if !self.show_only_currencies.is_empty() {
                query.append_pair("showOnlyCurrencies", &self.show_only_currencies.join(","));
            }
            if let Some(language) = &self.language {
                query.append_pair("language", language);
            }
        }

        tracing::debug!(currency = %self.currency_code, "Built on-ramp widget URL");
        Ok(url)
    }
}
