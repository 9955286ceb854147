use common::{config::ConfigError, stats::StatsError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error(transparent)]
    UnknownHost(#[from] ConfigError),
    #[error("Server {server}: expected a user@host line, reached end of input")]
    MissingIdentity { server: usize },
    #[error("Server {server}: missing parameter line")]
    MissingParams { server: usize },
    #[error("Line {line}: expected user@host, got {text:?}")]
    BadIdentity { line: usize, text: String },
    #[error("Line {line}: missing value for flag {flag}")]
    MissingFlag { line: usize, flag: &'static str },
    #[error("Line {line}: flag {flag} value {text} is out of range")]
    BadFlag {
        line: usize,
        flag: &'static str,
        text: String,
    },
    #[error("Server {server}: expected {expected} latencies, input ended after {found}")]
    ShortRead {
        server: usize,
        expected: usize,
        found: usize,
    },
    #[error("Line {line}: invalid latency {text:?}")]
    BadLatency { line: usize, text: String },
    #[error(transparent)]
    Regex(#[from] regex::Error),
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error("Invalid run json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
