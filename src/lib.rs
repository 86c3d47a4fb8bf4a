//! # God's Dollar Market Data Client
//!
//! Best-effort, display-ready cryptocurrency quotes for the God's Dollar site.
//! Quotes come from CoinGecko, fall back to MoonPay's currency listing, and
//! finally to a built-in list, so the views always have something to render.
//!
//! ## Usage
//!
//! ```no_run
//! use godsdollar_market_data::{format_compact, format_percent, format_price, MarketDataClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = MarketDataClient::from_env()?;
//!
//! for quote in client.list_top_assets("usd", 10).await {
//!     println!(
//!         "{:<12} {:>12} {:>8} {:>10}",
//!         quote.name,
//!         format_price(quote.current_price),
//!         format_percent(quote.price_change_percentage_24h),
//!         format_compact(quote.market_cap),
//!     );
//! }
//!
//! let matches = client.search_assets("gods").await;
//! let logo = client.resolve_image_url("godsdollar");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! MarketDataClient
//!     ↓
//! ResponseCache (5 min TTL, swept every minute)
//!     ↓ miss
//! CoinGecko  ── 429 → RateLimitGate, 404 → CallLedger blacklist, else retry ×3
//!     ↓ failure
//! MoonPay currency listing (missing numbers → 0)
//!     ↓ failure
//! Built-in quotes / empty result
//! ```
//!
//! ## Configuration
//!
//! Policies are compile-time constants in [`constants`]. API keys are read
//! from `COINGECKO_API_KEY` and `MOONPAY_API_KEY`; without a MoonPay key the
//! secondary tier and the buy widget are disabled.

pub mod cache;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod images;
pub mod ledger;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod storage;
pub mod types;
pub mod widget;

// Re-export commonly used types
pub use client::MarketDataClient;
pub use config::ClientConfig;
pub use error::{ProviderError, StorageError, WidgetError};
pub use format::{format_compact, format_percent, format_price};
pub use metrics::ProviderMetrics;
pub use storage::PortfolioStore;
pub use types::{
    AssetQuote, ComponentHealth, HealthStatus, SearchMatch, TransactionKind, TransactionRecord,
    TransactionStatus,
};
pub use widget::OnRampWidget;
