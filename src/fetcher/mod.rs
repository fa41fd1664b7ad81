//! Selling Partner API client

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::config::Credentials;
use crate::{
    Compression, RawArtifact, ReportDocument, ReportDocumentId, ReportId, ReportRequest,
    ReportStatusSnapshot,
};

pub mod reports;
pub mod retry_formatter;
pub mod sp_config;
pub mod sp_http;
pub mod token;

pub use reports::SpReportsClient;
pub use token::{AccessToken, TokenProvider};

/// Why a single HTTP exchange failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestFailure {
    /// Upstream answered with a non-success status
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        /// Logical endpoint name
        endpoint: String,
        /// HTTP status code
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// No usable response (DNS, connect, timeout, TLS, body read)
    #[error("network error calling {endpoint}: {message}")]
    Network {
        /// Logical endpoint name
        endpoint: String,
        /// Transport error description
        message: String,
    },

    /// Success status but the body was unusable
    #[error("unexpected response from {endpoint}: {message}")]
    InvalidResponse {
        /// Logical endpoint name
        endpoint: String,
        /// What was wrong with it
        message: String,
    },
}

impl RequestFailure {
    /// HTTP status, if upstream answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Logical endpoint name
    pub fn endpoint(&self) -> &str {
        match self {
            RequestFailure::Status { endpoint, .. }
            | RequestFailure::Network { endpoint, .. }
            | RequestFailure::InvalidResponse { endpoint, .. } => endpoint,
        }
    }
}

/// Fetcher errors, one per failing component
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetcherError {
    /// Token exchange failed
    #[error("token exchange failed: {0}")]
    Auth(RequestFailure),

    /// Report creation failed or returned no id
    #[error("report submission failed: {0}")]
    Submission(RequestFailure),

    /// Status query, document metadata or download failed
    #[error("report fetch failed: {0}")]
    Fetch(RequestFailure),
}

impl FetcherError {
    /// Underlying request failure
    pub fn failure(&self) -> &RequestFailure {
        match self {
            FetcherError::Auth(f) | FetcherError::Submission(f) | FetcherError::Fetch(f) => f,
        }
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Operations the extractor needs from the Selling Partner API
///
/// [`SpReportsClient`] talks to the real service; tests provide scripted
/// implementations.
#[async_trait]
pub trait ReportsApi: Send + Sync {
    /// Exchange the refresh token for a short-lived access token
    async fn access_token(&self, credentials: &Credentials) -> FetcherResult<AccessToken>;

    /// Submit a report request
    async fn create_report(
        &self,
        token: &AccessToken,
        request: &ReportRequest,
    ) -> FetcherResult<ReportId>;

    /// Query the current processing status of a report
    async fn get_report(
        &self,
        token: &AccessToken,
        report_id: &ReportId,
    ) -> FetcherResult<ReportStatusSnapshot>;

    /// Resolve download URL and compression for a document
    async fn get_document(
        &self,
        token: &AccessToken,
        document_id: &ReportDocumentId,
    ) -> FetcherResult<ReportDocument>;

    /// Download the document bytes (no auth header)
    async fn download(&self, document: &ReportDocument) -> FetcherResult<Bytes>;

    /// Metadata lookup followed by download
    ///
    /// # Returns
    /// The raw bytes and the compression indicator, if any
    async fn fetch_document(
        &self,
        token: &AccessToken,
        document_id: &ReportDocumentId,
    ) -> FetcherResult<(RawArtifact, Option<Compression>)> {
        let document = self.get_document(token, document_id).await?;
        debug!(
            document_id = %document_id,
            compression = ?document.compression_algorithm,
            "Resolved report document"
        );

        let bytes = self.download(&document).await?;
        Ok((RawArtifact::new(bytes), document.compression_algorithm))
    }
}
