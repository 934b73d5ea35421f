use thiserror::Error;

/// Failure of a single fetch attempt, or of the whole retry budget.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid request URL: {0}")]
    Url(String),

    #[error("response not JSON (status {status}, content-type {content_type:?})")]
    Format { status: u16, content_type: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("NSE fetch failed after {attempts} attempts for URL {url}: {source}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Number of attempts spent, for an exhausted fetch.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            FetchError::Exhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
