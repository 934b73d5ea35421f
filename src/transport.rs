use std::future::Future;

use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::debug;

use crate::config::{Config, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use crate::error::FetchError;

/// What the fetcher needs to know about one HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_json(&self) -> bool {
        self.content_type
            .to_ascii_lowercase()
            .contains("application/json")
    }
}

/// A single GET with a referer. The production impl shares one cookie jar across calls.
pub trait Transport {
    fn get(
        &self,
        url: &str,
        referer: &str,
    ) -> impl Future<Output = Result<RawResponse, FetchError>> + Send;
}

/// reqwest-backed transport. Build once and reuse: the cookie store is what keeps
/// the exchange from answering with its HTML block page.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(cfg: &Config) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        if let Ok(origin) = HeaderValue::from_str(&cfg.base_url) {
            headers.insert(header::ORIGIN, origin);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .timeout(cfg.request_timeout)
            .build()?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str, referer: &str) -> Result<RawResponse, FetchError> {
        let resp = self
            .client
            .get(url)
            .header(header::REFERER, referer)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = resp.text().await?;

        debug!(url, status, content_type = %content_type, bytes = body.len(), "GET complete");

        Ok(RawResponse { status, content_type, body })
    }
}
