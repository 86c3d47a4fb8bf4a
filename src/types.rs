//! Types for the market data client

use crate::constants::GODSDOLLAR_ID;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-in-time market snapshot for one asset
///
/// Quotes are never patched: every successful fetch produces a new value
/// that replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetQuote {
    /// Provider identifier (e.g. "bitcoin")
    pub id: String,
    /// Ticker symbol, lowercase as CoinGecko reports it
    pub symbol: String,
    /// Display name
    pub name: String,
    /// Image URL or local asset path
    pub image: String,
    /// Price in the requested currency
    pub current_price: f64,
    /// 24h price change percentage
    pub price_change_percentage_24h: f64,
    /// Market capitalization
    pub market_cap: f64,
    /// 24h trading volume
    pub total_volume: f64,
    /// 24h high
    pub high_24h: Option<f64>,
    /// 24h low
    pub low_24h: Option<f64>,
    /// Rank by market cap
    pub market_cap_rank: Option<u32>,
}

impl AssetQuote {
    /// Creates a quote with zeroed market fields
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            image: String::new(),
            current_price: 0.0,
            price_change_percentage_24h: 0.0,
            market_cap: 0.0,
            total_volume: 0.0,
            high_24h: None,
            low_24h: None,
            market_cap_rank: None,
        }
    }
}

/// Lightweight result of a free-text search or trending lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub market_cap_rank: Option<u32>,
    pub thumb: Option<String>,
}

/// Built-in quotes served when every provider has failed
///
/// Ordered by rank; the last entry is the site's own token.
pub fn fallback_quotes() -> Vec<AssetQuote> {
    let entry = |id: &str,
                 symbol: &str,
                 name: &str,
                 image: &str,
                 price: f64,
                 change: f64,
                 cap: f64,
                 volume: f64,
                 rank: u32| AssetQuote {
        id: id.to_string(),
        symbol: symbol.to_string(),
        name: name.to_string(),
        image: image.to_string(),
        current_price: price,
        price_change_percentage_24h: change,
        market_cap: cap,
        total_volume: volume,
        high_24h: None,
        low_24h: None,
        market_cap_rank: Some(rank),
    };

    vec![
        entry(
            "bitcoin",
            "btc",
            "Bitcoin",
            "/assets/crypto/bitcoin.png",
            67_500.0,
            1.2,
            1.33e12,
            2.8e10,
            1,
        ),
        entry(
            "ethereum",
            "eth",
            "Ethereum",
            "/assets/crypto/ethereum.png",
            3_500.0,
            0.8,
            4.2e11,
            1.5e10,
            2,
        ),
        entry(
            "solana",
            "sol",
            "Solana",
            "/assets/crypto/solana.png",
            150.0,
            2.1,
            7.0e10,
            3.0e9,
            3,
        ),
        entry(
            "cardano",
            "ada",
            "Cardano",
            "/assets/crypto/cardano.png",
            0.45,
            -0.5,
            1.6e10,
            4.0e8,
            4,
        ),
        entry(
            GODSDOLLAR_ID,
            "gd",
            "God's Dollar",
            "/assets/godsdollar-logo.png",
            1.0,
            0.0,
            0.0,
            0.0,
            5,
        ),
    ]
}

/// Kind of on-ramp transaction recorded locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Buy,
    Sell,
}

/// Status of a recorded transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// Summary of a purchase kept in local storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub currency_code: String,
    pub amount: f64,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    /// Creates a pending record stamped with the current time
    pub fn pending(kind: TransactionKind, currency_code: impl Into<String>, amount: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            currency_code: currency_code.into(),
            amount,
            status: TransactionStatus::Pending,
            timestamp: Utc::now(),
        }
    }
}

/// Overall system health status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Primary provider reachable, nothing suppressed
    Healthy,
    /// Serving degraded data (gate active or identifiers blacklisted)
    Degraded,
    /// Primary provider has only failed
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}
