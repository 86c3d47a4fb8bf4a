//! Error types for the market data client

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when fetching data from a provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Invalid response from provider
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded, with the server's reset hint if it sent one
    #[error("Rate limit exceeded (retry after {retry_after:?})")]
    RateLimitExceeded { retry_after: Option<Duration> },

    /// Identifier unknown to this provider
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider has no endpoint for this operation
    #[error("Operation not supported by {0}")]
    UnsupportedOperation(&'static str),

    /// Provider API error
    #[error("Provider API error: {0}")]
    ApiError(String),

    /// Timeout waiting for response
    #[error("Request timeout")]
    Timeout,
}

impl ProviderError {
    /// Maps a reqwest failure, keeping timeouts distinguishable
    pub fn from_request(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::NetworkError(err)
        }
    }

    /// True when another attempt against the same provider may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_) | Self::InvalidResponse(_) | Self::ApiError(_) | Self::Timeout
        )
    }

    /// True when the identifier should never be asked for again
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Errors from the local favorites/transactions storage
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors building the on-ramp widget URL
#[derive(Debug, Error)]
pub enum WidgetError {
    /// No on-ramp API key configured
    #[error("On-ramp API key is not configured")]
    MissingApiKey,

    /// Base URL could not be parsed
    #[error("Invalid widget URL: {0}")]
    InvalidUrl(String),
}
