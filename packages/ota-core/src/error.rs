use ota_utils::http::HttpError;
use std::time::Duration;
use thiserror::Error;

/// Failure of the network part of a check.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid update server url: {0}")]
    InvalidUrl(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("request cancelled")]
    Cancelled,
}

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Timeout(timeout) => FetchError::Timeout(timeout),
            other => FetchError::Connection(other.to_string()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckError {
    #[error("could not check for updates, not connected to the network")]
    Offline,
}
