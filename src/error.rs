use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Network-level failure talking to one of the endpoints
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    // Response arrived but could not be understood
    #[error("malformed response: {0}")]
    Data(String),

    #[error("this client has already voted")]
    AlreadyVoted,

    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(i64),

    #[error("local storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// True for failures of the connection to the backend, as opposed to
    /// local policy or storage problems.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Status(_) | Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
