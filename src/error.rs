//! Structured error types for the data layer.
//!
//! "No data" and "insufficient data" are not errors: they surface as `Ok(None)`.
//! Everything here is either a definite client/schema failure or a transport
//! failure that survived the retry budget.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("{section} '{code}' does not exist")]
    NotFound { section: String, code: String },

    #[error("factor '{group}.{factor}' does not exist")]
    UnknownFactor { group: String, factor: String },

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("glossary error: {0}")]
    Glossary(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DataError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            DataError::Upstream(_) | DataError::Cache(_) | DataError::Parquet(_) => true,
            DataError::Io(_) | DataError::Json(_) => true,
            DataError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn not_found(section: impl Into<String>, code: impl Into<String>) -> Self {
        DataError::NotFound {
            section: section.into(),
            code: code.into(),
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => DataError::Http {
                status: status.as_u16(),
                url: e.url().map(|u| u.path().to_string()).unwrap_or_default(),
            },
            None => DataError::Upstream(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
