use std::time::Duration;

use crate::error::{AppError, Result};

pub const BASE_URL: &str = "https://www.nseindia.com";

pub const OPTION_CHAIN_INDICES_PATH: &str = "/api/option-chain-indices";
pub const OPTION_CHAIN_EQUITIES_PATH: &str = "/api/option-chain-equities";
pub const ALL_INDICES_PATH: &str = "/api/allIndices";

/// Pages visited before an API call so the server hands out a session cookie.
pub const OPTION_CHAIN_REFERER_PATH: &str = "/option-chain";
pub const LIVE_MARKET_REFERER_PATH: &str = "/market-data/live-equity-market";

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                              AppleWebKit/537.36 (KHTML, like Gecko) \
                              Chrome/115.0.0.0 Safari/537.36";
pub const ACCEPT: &str = "application/json, text/plain, */*";
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Per-request timeout (seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Pause after the cookie warm-up requests (milliseconds).
pub const COOKIE_SETTLE_MS: u64 = 500;

/// Linear backoff unit: attempt `n` (0-based) waits `(1 + n)` units.
pub const BACKOFF_UNIT_MS: u64 = 1000;

/// Symbols served by the indices option-chain endpoint; everything else is an equity.
pub const INDEX_SYMBOLS: &[&str] = &["NIFTY", "BANKNIFTY", "FINNIFTY", "MIDCPNIFTY", "NIFTYNXT50"];

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub cookie_settle: Duration,
    pub backoff_unit: Duration,
    pub log_level: String,
    /// Symbol the snapshot binary reports on (NSE_SYMBOL).
    pub symbol: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            cookie_settle: Duration::from_millis(COOKIE_SETTLE_MS),
            backoff_unit: Duration::from_millis(BACKOFF_UNIT_MS),
            log_level: "info".to_string(),
            symbol: "NIFTY".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            base_url: std::env::var("NSE_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            max_retries: match std::env::var("NSE_MAX_RETRIES") {
                Ok(s) => s.parse::<u32>().map_err(|_| {
                    AppError::Config("NSE_MAX_RETRIES must be a non-negative integer".to_string())
                })?,
                Err(_) => defaults.max_retries,
            },
            request_timeout: match std::env::var("NSE_TIMEOUT_SECS") {
                Ok(s) => Duration::from_secs(s.parse::<u64>().map_err(|_| {
                    AppError::Config("NSE_TIMEOUT_SECS must be a whole number of seconds".to_string())
                })?),
                Err(_) => defaults.request_timeout,
            },
            cookie_settle: defaults.cookie_settle,
            backoff_unit: defaults.backoff_unit,
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            symbol: std::env::var("NSE_SYMBOL")
                .map(|s| s.trim().to_uppercase())
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.symbol),
        })
    }

    /// Landing page used for the first cookie warm-up request.
    pub fn landing_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub fn is_index_symbol(symbol: &str) -> bool {
    INDEX_SYMBOLS.iter().any(|s| s.eq_ignore_ascii_case(symbol))
}
