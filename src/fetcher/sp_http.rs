//! Selling Partner HTTP client helper
//!
//! Provides the one place where requests are sent:
//! - success/failure classification
//! - optional transport retry with exponential backoff
//! - request metrics and structured logs
//!
//! Each call is attempted once unless the client was built with
//! transport retries, and even then only network errors, 429 and 5xx are
//! retried.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{
    calculate_backoff, HTTP_CONNECT_TIMEOUT_SECS, HTTP_REQUEST_TIMEOUT_SECS,
};
use crate::fetcher::retry_formatter::{extract_error_type, RetryContext, RetryErrorType};
use crate::fetcher::RequestFailure;
use crate::metrics::{record_retry_backoff, HttpRequestMetrics};

/// Header carrying the access token on API calls
pub const ACCESS_TOKEN_HEADER: &str = "x-amz-access-token";

/// Build the HTTP client used for a run
///
/// Configured with explicit timeouts to prevent indefinite hangs.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
        .user_agent(concat!("report-extractor/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Shared HTTP client for all Selling Partner calls
#[derive(Clone)]
pub struct SpHttpClient {
    client: Arc<Client>,
    transport_retries: u32,
}

impl SpHttpClient {
    /// Create new HTTP client
    ///
    /// # Arguments
    /// * `client` - Shared reqwest client (Arc for cheap cloning)
    /// * `transport_retries` - Extra attempts for transient failures (0 = single attempt)
    pub fn new(client: Arc<Client>, transport_retries: u32) -> Self {
        Self {
            client,
            transport_retries,
        }
    }

    /// Configured transport retries
    pub fn transport_retries(&self) -> u32 {
        self.transport_retries
    }

    /// Underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Send a request and return the response if its status is a success
    ///
    /// # Arguments
    /// * `endpoint` - Logical endpoint name for logs and metrics
    /// * `request` - Fully built request; cloned for each retry
    ///
    /// # Errors
    /// [`RequestFailure::Status`] for non-success responses,
    /// [`RequestFailure::Network`] when no response arrived
    pub async fn send(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<Response, RequestFailure> {
        let max_attempts = self.transport_retries + 1;
        let mut attempt: u32 = 1;

        loop {
            // Form and JSON bodies always clone; a streaming body goes out once.
            let Some(this_try) = request.try_clone() else {
                return self
                    .send_once(endpoint, request, attempt)
                    .await
                    .map_err(|(error_type, failure)| {
                        let ctx = RetryContext::new(
                            attempt,
                            attempt,
                            error_type,
                            Duration::ZERO,
                            failure.to_string(),
                            endpoint,
                        );
                        warn!("{}", ctx.format_failure());
                        failure
                    });
            };

            let (error_type, failure) = match self.send_once(endpoint, this_try, attempt).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            let backoff = calculate_backoff(attempt - 1);
            let ctx = RetryContext::new(
                attempt,
                max_attempts,
                error_type,
                backoff,
                failure.to_string(),
                endpoint,
            );

            if attempt >= max_attempts || !error_type.is_retryable() {
                warn!("{}", ctx.format_failure());
                return Err(failure);
            }

            warn!("{}", ctx.format_retry());
            record_retry_backoff(backoff, attempt);
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    /// One attempt, classified
    async fn send_once(
        &self,
        endpoint: &str,
        request: RequestBuilder,
        attempt: u32,
    ) -> Result<Response, (RetryErrorType, RequestFailure)> {
        let metrics = HttpRequestMetrics::start(endpoint, attempt);
        debug!(
            endpoint,
            attempt,
            correlation_id = %metrics.correlation_id(),
            "Sending request"
        );

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics.record_network_error();
                return Err((extract_error_type(None, Some(&e)), network_failure(endpoint, e)));
            }
        };

        let status = response.status();
        metrics.record_complete(status.as_u16());

        if status.is_success() {
            debug!(endpoint, attempt, status = status.as_u16(), "Request succeeded");
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        Err((
            extract_error_type(Some(status), None),
            RequestFailure::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            },
        ))
    }

    /// Send a request and deserialize a JSON success body
    pub async fn send_json<T>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, RequestFailure>
    where
        T: DeserializeOwned,
    {
        let response = self.send(endpoint, request).await?;
        read_json(endpoint, response).await
    }
}

/// Deserialize a success body, mapping failures to [`RequestFailure`]
pub async fn read_json<T>(endpoint: &str, response: Response) -> Result<T, RequestFailure>
where
    T: DeserializeOwned,
{
    let text = response
        .text()
        .await
        .map_err(|e| network_failure(endpoint, e))?;

    serde_json::from_str(&text).map_err(|e| RequestFailure::InvalidResponse {
        endpoint: endpoint.to_string(),
        message: format!("failed to deserialize response: {e}"),
    })
}

/// Transport failure without the request URL
///
/// reqwest includes the full URL in its error text, which for a download
/// carries the pre-signed query.
pub fn network_failure(endpoint: &str, error: reqwest::Error) -> RequestFailure {
    RequestFailure::Network {
        endpoint: endpoint.to_string(),
        message: error.without_url().to_string(),
    }
}

/// Strip the query string from a URL before it reaches a log line
///
/// Download URLs are pre-signed; the signature lives in the query.
pub fn redact_url(url: &str) -> &str {
    match url.find('?') {
        Some(idx) => &url[..idx],
        None => url,
    }
}
