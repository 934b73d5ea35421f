//! NSE derivatives and index data: cookie-warmed JSON fetches, flattening into
//! [`MarketSnapshot`] tables, and open-interest sentiment metrics.

pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod futures;
pub mod metrics;
pub mod normalize;
pub mod snapshot;
pub mod transport;

pub use client::NseClient;
pub use config::Config;
pub use error::{AppError, FetchError, Result};
pub use fetcher::Fetcher;
pub use metrics::{
    max_open_interest_strikes, nearest_expiry_slice, put_call_ratio, MaxOiStrikes, PutCallRatio,
};
pub use normalize::{normalize, normalize_index, normalize_option_chain, SideMode};
pub use snapshot::{MarketSnapshot, Row, SnapshotMeta};
pub use transport::{HttpTransport, RawResponse, Transport};
