//! Run configuration and defaults
//!
//! Everything a run needs is assembled once into an [`ExtractorConfig`] and
//! passed by reference; nothing below reads the environment on its own.

use std::fmt;
use std::time::Duration;

use crate::fetcher::sp_config::{SpApiEndpoints, SpRegion};
use crate::poller::PollPolicy;

/// Environment variable holding the LWA client identifier
pub const ENV_CLIENT_ID: &str = "SP_API_CLIENT";

/// Environment variable holding the LWA client secret
pub const ENV_CLIENT_SECRET: &str = "SP_API_SECRET";

/// Environment variable holding the long-lived refresh token
pub const ENV_REFRESH_TOKEN: &str = "SP_API_REFRESH";

/// Environment variable overriding the default bucket
pub const ENV_BUCKET: &str = "REPORTS_BUCKET";

/// Bucket used when neither `--bucket` nor `REPORTS_BUCKET` is set
pub const DEFAULT_BUCKET: &str = "your-bucket-name";

/// Maximum status queries before giving up on a report.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Delay between status queries.
/// Report generation takes minutes, so polling faster only burns quota.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Transport retries for the single-shot calls (token, submit, fetch).
/// Zero keeps every call to exactly one attempt.
pub const DEFAULT_TRANSPORT_RETRIES: u32 = 0;

/// Upper bound accepted for `--transport-retries`
pub const MAX_TRANSPORT_RETRIES: u32 = 10;

/// HTTP connect timeout (seconds)
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP request timeout for API calls (seconds)
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timeout for the document download itself (seconds).
/// Documents can be tens of megabytes.
pub const HTTP_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Initial transport backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Transport backoff cap in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30000;

/// Calculate exponential backoff delay for transport retries
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(retry_count));
    Duration::from_millis(delay_ms.min(MAX_BACKOFF_MS))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable missing or empty
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    /// A setting had an unusable value
    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    /// The report request could not be built
    #[error("invalid report request: {0}")]
    InvalidRequest(String),
}

/// Login-with-Amazon application credentials
///
/// Never logged: the [`fmt::Debug`] impl redacts the secret and token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

impl Credentials {
    /// Create credentials from explicit values
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Read `SP_API_CLIENT`, `SP_API_SECRET` and `SP_API_REFRESH`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVar(key))
        };

        Ok(Self {
            client_id: read(ENV_CLIENT_ID)?,
            client_secret: read(ENV_CLIENT_SECRET)?,
            refresh_token: read(ENV_REFRESH_TOKEN)?,
        })
    }

    /// Client identifier
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Client secret
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Refresh token
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Settings for one extraction run
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Application credentials
    pub credentials: Credentials,
    /// Token and API endpoints
    pub endpoints: SpApiEndpoints,
    /// Default bucket for stored artifacts
    pub bucket: String,
    /// Status polling budget
    pub poll: PollPolicy,
    /// Extra attempts for transient failures on single-shot calls
    pub transport_retries: u32,
}

impl ExtractorConfig {
    /// Defaults for the North America region
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            endpoints: SpApiEndpoints::for_region(SpRegion::NorthAmerica),
            bucket: DEFAULT_BUCKET.to_string(),
            poll: PollPolicy::default(),
            transport_retries: DEFAULT_TRANSPORT_RETRIES,
        }
    }

    /// Override the endpoints
    pub fn with_endpoints(mut self, endpoints: SpApiEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Override the default bucket
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Override the polling budget
    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Override transport retries
    pub fn with_transport_retries(mut self, retries: u32) -> Self {
        self.transport_retries = retries;
        self
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::InvalidSetting(
                "bucket name cannot be empty".to_string(),
            ));
        }
        if self.poll.max_attempts() == 0 {
            return Err(ConfigError::InvalidSetting(
                "max attempts must be at least 1".to_string(),
            ));
        }
        if self.transport_retries > MAX_TRANSPORT_RETRIES {
            return Err(ConfigError::InvalidSetting(format!(
                "transport retries {} exceeds maximum of {MAX_TRANSPORT_RETRIES}",
                self.transport_retries
            )));
        }
        Ok(())
    }
}
