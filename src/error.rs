use std::time::Duration;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("session is not logged in")]
    NotLoggedIn,

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("scraping failed: {0}")]
    Scrape(String),

    #[error("output '{output}' is not a valid output parameter, valid values are {valid:?}")]
    InvalidOutput { output: String, valid: Vec<String> },

    #[error("could not parse log line '{line}': {reason}")]
    LogParse { line: String, reason: String },

    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("unable to complete synchronization within {} seconds, it will continue on the device in the background", .0.as_secs())]
    SyncTimeout(Duration),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PortalError {
    pub fn transport(url: &str, source: impl Into<BoxError>) -> Self {
        PortalError::Transport {
            url: url.to_string(),
            source: source.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PortalError::SyncTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
