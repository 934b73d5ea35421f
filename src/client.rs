use reqwest::Url;
use serde_json::Value;
use tracing::info;

use crate::config::{
    is_index_symbol, Config, ALL_INDICES_PATH, LIVE_MARKET_REFERER_PATH,
    OPTION_CHAIN_EQUITIES_PATH, OPTION_CHAIN_INDICES_PATH, OPTION_CHAIN_REFERER_PATH,
};
use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::futures::index_futures;
use crate::normalize::{normalize, normalize_index, normalize_option_chain, SideMode, OPTION_RECORDS_PATH};
use crate::snapshot::MarketSnapshot;
use crate::transport::{HttpTransport, Transport};

/// Endpoint-level API over one shared session.
pub struct NseClient<T = HttpTransport> {
    cfg: Config,
    fetcher: Fetcher<T>,
}

impl NseClient<HttpTransport> {
    pub fn new(cfg: Config) -> Result<Self, FetchError> {
        let transport = HttpTransport::new(&cfg)?;
        Ok(Self::with_transport(cfg, transport))
    }
}

impl<T: Transport> NseClient<T> {
    pub fn with_transport(cfg: Config, transport: T) -> Self {
        let fetcher = Fetcher::new(transport, &cfg);
        Self { cfg, fetcher }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn fetcher(&self) -> &Fetcher<T> {
        &self.fetcher
    }

    /// Raw JSON from any exchange URL, using the configured retry budget.
    pub async fn fetch_json(&self, url: &str, referer: Option<&str>) -> Result<Value, FetchError> {
        self.fetcher.fetch_json(url, referer, self.cfg.max_retries).await
    }

    /// Indices go to `option-chain-indices`, everything else to `option-chain-equities`.
    /// The symbol is form-encoded into the query (`M&M` becomes `M%26M`).
    pub fn option_chain_url(&self, symbol: &str) -> Result<String, FetchError> {
        let path = if is_index_symbol(symbol) {
            OPTION_CHAIN_INDICES_PATH
        } else {
            OPTION_CHAIN_EQUITIES_PATH
        };
        let url = Url::parse_with_params(&self.cfg.url(path), &[("symbol", symbol)])
            .map_err(|e| FetchError::Url(format!("{path}: {e}")))?;
        Ok(url.to_string())
    }

    pub async fn fetch_option_chain(&self, symbol: &str) -> Result<MarketSnapshot, FetchError> {
        let payload = self.fetch_derivatives(symbol).await?;
        let snapshot = normalize_option_chain(&payload);
        info!(
            symbol,
            rows = snapshot.len(),
            underlying = ?snapshot.meta().underlying,
            "Option chain fetched: {} rows",
            snapshot.len(),
        );
        Ok(snapshot)
    }

    pub async fn fetch_index_snapshot(&self) -> Result<MarketSnapshot, FetchError> {
        let url = self.cfg.url(ALL_INDICES_PATH);
        let referer = self.cfg.url(LIVE_MARKET_REFERER_PATH);
        let payload = self.fetch_json(&url, Some(&referer)).await?;
        let snapshot = normalize_index(&payload);
        info!(rows = snapshot.len(), "Index snapshot fetched: {} indices", snapshot.len());
        Ok(snapshot)
    }

    /// Derivative legs for `symbol`, one row per call/put leg merged with the
    /// record's `metadata`.
    pub async fn fetch_futures_and_options(&self, symbol: &str) -> Result<MarketSnapshot, FetchError> {
        let payload = self.fetch_derivatives(symbol).await?;
        let snapshot = normalize(&payload, OPTION_RECORDS_PATH, SideMode::Split);
        info!(symbol, rows = snapshot.len(), "F&O legs fetched: {} rows", snapshot.len());
        Ok(snapshot)
    }

    /// Index futures contracts for `symbol`, nearest expiry first.
    pub async fn fetch_index_futures(&self, symbol: &str) -> Result<MarketSnapshot, FetchError> {
        let payload = self.fetch_derivatives(symbol).await?;
        let snapshot = index_futures(&payload);
        info!(symbol, rows = snapshot.len(), "Index futures fetched: {} contracts", snapshot.len());
        Ok(snapshot)
    }

    async fn fetch_derivatives(&self, symbol: &str) -> Result<Value, FetchError> {
        let url = self.option_chain_url(symbol)?;
        let referer = self.cfg.url(OPTION_CHAIN_REFERER_PATH);
        self.fetch_json(&url, Some(&referer)).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::metrics::{max_open_interest_strikes, nearest_expiry_slice, put_call_ratio};
    use crate::normalize::SIDE_COLUMN;
    use crate::transport::testing::{html, json, ScriptedTransport};

    const BASE: &str = "http://nse.test";

    fn test_config() -> Config {
        Config {
            base_url: BASE.to_string(),
            max_retries: 3,
            cookie_settle: Duration::ZERO,
            backoff_unit: Duration::ZERO,
            ..Config::default()
        }
    }

    fn chain_payload() -> Value {
        json!({
            "records": {
                "underlyingValue": 25150.0,
                "expiryDates": ["21-Oct-2025", "28-Oct-2025"],
                "data": [
                    {"strikePrice": 25000, "expiryDate": "21-Oct-2025",
                     "CE": {"openInterest": 120, "changeinOpenInterest": 15},
                     "PE": {"openInterest": 80, "changeinOpenInterest": 20}},
                    {"strikePrice": 25100, "expiryDate": "21-Oct-2025",
                     "CE": {"openInterest": 0, "changeinOpenInterest": 0},
                     "PE": {"openInterest": 0, "changeinOpenInterest": 0}},
                    {"strikePrice": 25000, "expiryDate": "28-Oct-2025",
                     "CE": {"openInterest": 0, "changeinOpenInterest": 0},
                     "PE": {"openInterest": 0, "changeinOpenInterest": 0}}
                ]
            }
        })
    }

    #[test]
    fn option_chain_url_routes_by_symbol_kind() {
        let client = NseClient::with_transport(test_config(), ScriptedTransport::new());
        assert_eq!(
            client.option_chain_url("NIFTY").unwrap(),
            "http://nse.test/api/option-chain-indices?symbol=NIFTY"
        );
        assert_eq!(
            client.option_chain_url("M&M").unwrap(),
            "http://nse.test/api/option-chain-equities?symbol=M%26M"
        );
        assert_eq!(
            client.option_chain_url("BAJAJ-AUTO").unwrap(),
            "http://nse.test/api/option-chain-equities?symbol=BAJAJ-AUTO"
        );
    }

    #[tokio::test]
    async fn bad_base_url_fails_before_any_request() {
        let cfg = Config {
            base_url: "not a url".to_string(),
            ..test_config()
        };
        let client = NseClient::with_transport(cfg, ScriptedTransport::new());

        let err = client.fetch_option_chain("NIFTY").await.unwrap_err();

        assert!(matches!(err, FetchError::Url(_)), "got {err:?}");
        assert!(client.fetcher().transport().calls().is_empty());
    }

    #[tokio::test]
    async fn option_chain_pipeline_end_to_end() {
        let url = "http://nse.test/api/option-chain-indices?symbol=NIFTY";
        let transport = ScriptedTransport::new().script(url, vec![html(), json(chain_payload())]);
        let client = NseClient::with_transport(test_config(), transport);

        let chain = client.fetch_option_chain("NIFTY").await.unwrap();

        assert_eq!(chain.len(), 3);
        assert_eq!(chain.meta().underlying, Some(25150.0));
        assert_eq!(put_call_ratio(&chain).as_tuple(), (0.67, -40.0));
        assert_eq!(max_open_interest_strikes(&chain).call, Some(25000.0));
        assert_eq!(nearest_expiry_slice(&chain).len(), 2);

        let calls = client.fetcher().transport().calls();
        let (_, referer) = calls.last().unwrap();
        assert_eq!(referer, "http://nse.test/option-chain");
    }

    #[tokio::test]
    async fn index_snapshot_uses_live_market_referer() {
        let url = "http://nse.test/api/allIndices";
        let transport = ScriptedTransport::new().script(
            url,
            vec![json(json!({"data": [{"index": "NIFTY 50", "last": 25150.0}]}))],
        );
        let client = NseClient::with_transport(test_config(), transport);

        let snap = client.fetch_index_snapshot().await.unwrap();

        assert_eq!(snap.len(), 1);
        let calls = client.fetcher().transport().calls();
        assert_eq!(
            calls.last().unwrap(),
            &(url.to_string(), "http://nse.test/market-data/live-equity-market".to_string())
        );
    }

    #[tokio::test]
    async fn futures_and_options_split_into_legs() {
        let url = "http://nse.test/api/option-chain-equities?symbol=RELIANCE";
        let transport = ScriptedTransport::new().script(url, vec![json(chain_payload())]);
        let client = NseClient::with_transport(test_config(), transport);

        let legs = client.fetch_futures_and_options("RELIANCE").await.unwrap();

        assert_eq!(legs.len(), 6);
        assert_eq!(legs.get(1, SIDE_COLUMN), Some(&json!("PE")));
    }

    #[tokio::test]
    async fn index_futures_from_derivative_records() {
        let url = "http://nse.test/api/option-chain-indices?symbol=NIFTY";
        let payload = json!({
            "records": {"data": [
                {"metadata": {"instrumentType": "Index Futures", "expiryDate": "28-Oct-2025", "lastPrice": 25200.0}}
            ]}
        });
        let transport = ScriptedTransport::new().script(url, vec![json(payload)]);
        let client = NseClient::with_transport(test_config(), transport);

        let fut = client.fetch_index_futures("NIFTY").await.unwrap();

        assert_eq!(fut.len(), 1);
        assert_eq!(fut.get(0, "lastPrice"), Some(&json!(25200.0)));
    }

    #[tokio::test]
    async fn blocked_endpoint_surfaces_exhausted_error() {
        let client = NseClient::with_transport(test_config(), ScriptedTransport::new());

        let err = client.fetch_index_snapshot().await.unwrap_err();

        assert_eq!(err.attempts(), Some(3));
        assert_eq!(client.fetcher().transport().calls_to("http://nse.test/api/allIndices"), 3);
    }
}
