//! Market data provider implementations

pub mod coingecko;
pub mod moonpay;

pub use coingecko::CoinGeckoProvider;
pub use moonpay::MoonPayProvider;
