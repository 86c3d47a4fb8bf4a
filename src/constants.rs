//! Constants for the market data client
//!
//! Timing policies, provider endpoints and the hand-maintained asset tables
//! live here. Only API keys and base URL overrides come from the environment
//! (see [`crate::config`]).

/// How long a cached response is served before it counts as a miss (in seconds)
pub const CACHE_TTL_SECS: u64 = 300;

/// How often expired cache entries are swept (in seconds)
pub const CACHE_SWEEP_INTERVAL_SECS: u64 = 60;

/// Minimum gap between image lookups for the same identifier (in seconds)
pub const IMAGE_LOOKUP_COOLDOWN_SECS: u64 = 60;

/// Gate duration after a 429 without a usable reset hint (in seconds)
pub const DEFAULT_RATE_LIMIT_BACKOFF_SECS: u64 = 300;

/// HTTP request timeout for the primary provider (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 5;

/// HTTP request timeout for the secondary provider (in seconds)
pub const SECONDARY_REQUEST_TIMEOUT_SECS: u64 = 5;

/// HTTP timeout for image probes (in seconds)
pub const IMAGE_PROBE_TIMEOUT_SECS: u64 = 5;

/// Total attempts against the primary provider for transient failures
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Fixed delay between primary retry attempts (in milliseconds)
pub const RETRY_DELAY_MS: u64 = 2000;

/// Errors tolerated for one identifier before it is blacklisted
pub const MAX_IDENTIFIER_ERRORS: u32 = 3;

/// Maximum number of search matches returned
pub const MAX_SEARCH_RESULTS: usize = 15;

/// Maximum number of recent transactions kept in local storage
pub const MAX_STORED_TRANSACTIONS: usize = 10;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Header carrying the CoinGecko API key
pub const COINGECKO_API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// MoonPay API base URL
pub const MOONPAY_API_URL: &str = "https://api.moonpay.com";

/// MoonPay buy widget base URL
pub const MOONPAY_WIDGET_URL: &str = "https://buy.moonpay.com";

/// Environment variable holding the CoinGecko API key
pub const COINGECKO_API_KEY_ENV: &str = "COINGECKO_API_KEY";

/// Environment variable holding the MoonPay API key
pub const MOONPAY_API_KEY_ENV: &str = "MOONPAY_API_KEY";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "godsdollar-market-data/0.1.0";

/// Identifier of the site's own token
pub const GODSDOLLAR_ID: &str = "godsdollar";

/// Images bundled with the site, checked before anything remote
pub const LOCAL_ASSET_IMAGES: &[(&str, &str)] = &[
    ("bitcoin", "/assets/crypto/bitcoin.png"),
    ("ethereum", "/assets/crypto/ethereum.png"),
    ("solana", "/assets/crypto/solana.png"),
    ("cardano", "/assets/crypto/cardano.png"),
    ("binancecoin", "/assets/crypto/bnb.png"),
    (GODSDOLLAR_ID, "/assets/godsdollar-logo.png"),
];

/// CoinGecko CDN image base
pub const COINGECKO_IMAGE_CDN: &str = "https://assets.coingecko.com/coins/images";

/// Known CoinGecko image ids: (coin id, numeric image id, file name)
pub const COINGECKO_IMAGE_IDS: &[(&str, u32, &str)] = &[
    ("tether", 325, "Tether.png"),
    ("ripple", 44, "xrp-symbol-white-128.png"),
    ("usd-coin", 6319, "usdc.png"),
    ("dogecoin", 5, "dogecoin.png"),
    ("tron", 1094, "tron-logo.png"),
    ("polkadot", 12171, "polkadot.png"),
    ("chainlink", 877, "chainlink-new-logo.png"),
    ("matic-network", 4713, "matic-token-icon.png"),
    ("litecoin", 2, "litecoin.png"),
    ("avalanche-2", 12559, "Avalanche_Circle_RedWhite_Trans.png"),
    ("shiba-inu", 11939, "shiba.png"),
    ("uniswap", 12504, "uni.jpg"),
    ("stellar", 100, "Stellar_symbol_black_RGB.png"),
    ("monero", 69, "monero_logo.png"),
    ("cosmos", 1481, "cosmos_hub.png"),
    ("the-open-network", 17980, "ton_symbol.png"),
    ("near", 10365, "near.jpg"),
    ("aptos", 26455, "aptos_round.png"),
    ("wrapped-bitcoin", 7598, "wrapped_bitcoin_wbtc.png"),
    ("dai", 9956, "Badge_Dai.png"),
];

/// Generic icon CDN tried first for unknown assets
pub const GUESS_IMAGE_URL_PATTERN: &str = "https://cryptoicons.org/api/icon/{id}/200";

/// Alternate icon URL patterns, probed in order after the guess
pub const ALTERNATE_IMAGE_URL_PATTERNS: &[&str] = &[
    "https://cdn.jsdelivr.net/gh/atomiclabs/cryptocurrency-icons@1a63530/128/color/{id}.png",
    "https://static.coincap.io/assets/icons/{id}@2x.png",
    "https://cryptologos.cc/logos/{id}-logo.png",
];

/// Avatar background colors for generated placeholders
pub const PLACEHOLDER_COLORS: &[&str] = &[
    "#F7931A", "#627EEA", "#14F195", "#0033AD", "#D4AF37", "#E84142", "#2775CA", "#8247E5",
];
