//! Crate-level error taxonomy
//!
//! Module errors roll up into [`ExtractError`]; [`ExtractError::class`] maps
//! every failure to exactly one [`ErrorClass`] for logs, metrics and exit
//! reporting.

use std::fmt;

use crate::config::ConfigError;
use crate::fetcher::FetcherError;
use crate::output::OutputError;
use crate::poller::PollError;

/// Failure class of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Token exchange rejected or unusable
    Auth,
    /// Report creation failed
    Submission,
    /// Upstream reported `CANCELLED` or `FATAL`
    TerminalReport,
    /// `DONE` without a document id
    DataIntegrity,
    /// Poll budget exhausted
    Timeout,
    /// Status query, document metadata or download failed
    Fetch,
    /// Gzip, UTF-8 or JSON decoding failed
    Decode,
    /// Object store write failed
    Storage,
    /// Missing environment or invalid settings
    Config,
}

impl ErrorClass {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Auth => "auth",
            ErrorClass::Submission => "submission",
            ErrorClass::TerminalReport => "terminal_report",
            ErrorClass::DataIntegrity => "data_integrity",
            ErrorClass::Timeout => "timeout",
            ErrorClass::Fetch => "fetch",
            ErrorClass::Decode => "decode",
            ErrorClass::Storage => "storage",
            ErrorClass::Config => "config",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by an extraction run
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Selling Partner API error
    #[error(transparent)]
    Fetcher(#[from] FetcherError),

    /// Polling ended without a document
    #[error(transparent)]
    Poll(#[from] PollError),

    /// Decoding or storage error
    #[error(transparent)]
    Output(#[from] OutputError),
}

impl ExtractError {
    /// Classify the failure
    pub fn class(&self) -> ErrorClass {
        match self {
            ExtractError::Config(_) => ErrorClass::Config,
            ExtractError::Fetcher(FetcherError::Auth(_)) => ErrorClass::Auth,
            ExtractError::Fetcher(FetcherError::Submission(_)) => ErrorClass::Submission,
            ExtractError::Fetcher(FetcherError::Fetch(_)) => ErrorClass::Fetch,
            ExtractError::Poll(PollError::Terminal { .. }) => ErrorClass::TerminalReport,
            ExtractError::Poll(PollError::MissingDocument { .. }) => ErrorClass::DataIntegrity,
            ExtractError::Poll(PollError::Timeout { .. }) => ErrorClass::Timeout,
            ExtractError::Poll(PollError::Query(_)) => ErrorClass::Fetch,
            ExtractError::Output(OutputError::Decode(_)) => ErrorClass::Decode,
            ExtractError::Output(_) => ErrorClass::Storage,
        }
    }
}

/// Result type for extraction runs
pub type ExtractResult<T> = Result<T, ExtractError>;
