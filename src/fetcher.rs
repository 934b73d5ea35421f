use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::FetchError;
use crate::transport::{HttpTransport, Transport};

/// Cookie-warming JSON fetcher with a linear retry budget.
pub struct Fetcher<T = HttpTransport> {
    transport: T,
    base_url: String,
    cookie_settle: Duration,
    backoff_unit: Duration,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, cfg: &Config) -> Self {
        Self {
            transport,
            base_url: cfg.landing_url().to_string(),
            cookie_settle: cfg.cookie_settle,
            backoff_unit: cfg.backoff_unit,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// GET `url` and parse it as JSON, retrying up to `max_retries` attempts.
    ///
    /// Every attempt re-visits the landing page and `referer` first (cookies expire
    /// quickly), then requests the target with `referer` as the Referer header.
    /// Attempt `n` (0-based) that fails waits `(1 + n) * backoff_unit` before the
    /// next one. A budget of 0 is treated as 1.
    pub async fn fetch_json(
        &self,
        url: &str,
        referer: Option<&str>,
        max_retries: u32,
    ) -> Result<Value, FetchError> {
        let referer = referer.unwrap_or(self.base_url.as_str());
        let budget = max_retries.max(1);
        let mut attempt = 0u32;

        loop {
            self.refresh_cookies(referer).await;

            match self.attempt(url, referer).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(url, attempts = attempt + 1, "NSE fetch recovered after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    attempt += 1;
                    warn!(url, attempt, "NSE fetch failed (attempt {attempt}): {e}");

                    if attempt >= budget {
                        return Err(FetchError::Exhausted {
                            url: url.to_string(),
                            attempts: attempt,
                            source: Box::new(e),
                        });
                    }

                    let delay = self.backoff_unit * attempt;
                    debug!(url, delay_ms = delay.as_millis() as u64, "backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(&self, url: &str, referer: &str) -> Result<Value, FetchError> {
        let resp = self.transport.get(url, referer).await?;
        if !resp.is_json() {
            return Err(FetchError::Format {
                status: resp.status,
                content_type: resp.content_type,
            });
        }
        Ok(serde_json::from_str(&resp.body)?)
    }

    /// Visit the landing page, then the referer page when it differs, so the jar
    /// holds fresh session cookies. Failures here are logged and otherwise ignored;
    /// the real request decides whether the attempt failed.
    async fn refresh_cookies(&self, referer: &str) {
        let landing = self.base_url.as_str();
        let pages = std::iter::once(landing).chain((referer != landing).then_some(referer));
        for page in pages {
            if let Err(e) = self.transport.get(page, page).await {
                warn!(page, "Cookie refresh failed: {e}");
            }
        }
        if !self.cookie_settle.is_zero() {
            tokio::time::sleep(self.cookie_settle).await;
        }
    }
}
