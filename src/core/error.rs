use std::io;

#[derive(thiserror::Error, Debug)]
pub enum GuardError {
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout")]
    Timeout,
    #[error("http error: {0}")]
    Http(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("domain list error: {0}")]
    Lists(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("sink error: {0}")]
    Sink(String),
    #[error("db error: {0}")]
    Db(String),
    #[error("unknown error")]
    Unknown,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<reqwest::Error> for GuardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GuardError::Timeout
        } else if err.is_connect() {
            GuardError::Network(err.to_string())
        } else if err.is_status() {
            GuardError::Http(err.to_string())
        } else if err.is_decode() {
            GuardError::Parse(err.to_string())
        } else {
            GuardError::Unknown
        }
    }
}

impl From<rusqlite::Error> for GuardError {
    fn from(err: rusqlite::Error) -> Self {
        GuardError::Db(err.to_string())
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(err: serde_json::Error) -> Self {
        GuardError::Parse(err.to_string())
    }
}

impl From<regex::Error> for GuardError {
    fn from(err: regex::Error) -> Self {
        GuardError::Config(format!("invalid pattern: {err}"))
    }
}
