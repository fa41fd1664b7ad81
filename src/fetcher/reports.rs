//! Reports API client
//!
//! Implements [`ReportsApi`] against the live Selling Partner endpoints:
//! createReport, getReport, getReportDocument and the document download.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::sp_config::SpApiEndpoints;
use super::sp_http::{build_http_client, network_failure, redact_url, SpHttpClient, ACCESS_TOKEN_HEADER};
use super::token::{AccessToken, TokenProvider};
use super::{FetcherError, FetcherResult, ReportsApi, RequestFailure};
use crate::config::{Credentials, HTTP_DOWNLOAD_TIMEOUT_SECS};
use crate::{ReportDocument, ReportDocumentId, ReportId, ReportRequest, ReportStatusSnapshot};

const CREATE_REPORT: &str = "createReport";
const GET_REPORT: &str = "getReport";
const GET_DOCUMENT: &str = "getReportDocument";
const DOWNLOAD: &str = "downloadDocument";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateReportResponse {
    #[serde(default)]
    report_id: Option<String>,
}

/// Live Selling Partner reports client
#[derive(Clone)]
pub struct SpReportsClient {
    http: SpHttpClient,
    endpoints: SpApiEndpoints,
    tokens: TokenProvider,
}

impl SpReportsClient {
    /// Create a client sharing one HTTP connection pool
    pub fn new(http: SpHttpClient, endpoints: SpApiEndpoints) -> Self {
        let tokens = TokenProvider::new(http.clone(), endpoints.token_url());
        Self {
            http,
            endpoints,
            tokens,
        }
    }

    /// Build the HTTP client and the reports client in one step
    pub fn connect(endpoints: SpApiEndpoints, transport_retries: u32) -> Result<Self, reqwest::Error> {
        let client = Arc::new(build_http_client()?);
        Ok(Self::new(SpHttpClient::new(client, transport_retries), endpoints))
    }

    /// Configured endpoints
    pub fn endpoints(&self) -> &SpApiEndpoints {
        &self.endpoints
    }
}

#[async_trait]
impl ReportsApi for SpReportsClient {
    async fn access_token(&self, credentials: &Credentials) -> FetcherResult<AccessToken> {
        self.tokens.access_token(credentials).await
    }

    async fn create_report(
        &self,
        token: &AccessToken,
        request: &ReportRequest,
    ) -> FetcherResult<ReportId> {
        let body = request.to_wire();
        debug!(
            report_type = %body.report_type,
            marketplaces = ?body.marketplace_ids,
            start = %body.data_start_time,
            end = %body.data_end_time,
            "Submitting report request"
        );

        let builder = self
            .http
            .inner()
            .post(self.endpoints.create_report_url())
            .header(ACCEPT, "application/json")
            .header(ACCESS_TOKEN_HEADER, token.secret())
            .json(&body);

        let response: CreateReportResponse = self
            .http
            .send_json(CREATE_REPORT, builder)
            .await
            .map_err(FetcherError::Submission)?;

        let report_id = response
            .report_id
            .filter(|id| !id.is_empty())
            .map(ReportId::new)
            .ok_or_else(|| {
                FetcherError::Submission(RequestFailure::InvalidResponse {
                    endpoint: CREATE_REPORT.to_string(),
                    message: "response did not contain reportId".to_string(),
                })
            })?;

        info!(report_id = %report_id, "Report requested");
        Ok(report_id)
    }

    async fn get_report(
        &self,
        token: &AccessToken,
        report_id: &ReportId,
    ) -> FetcherResult<ReportStatusSnapshot> {
        let builder = self
            .http
            .inner()
            .get(self.endpoints.report_url(report_id.as_str()))
            .header(ACCEPT, "application/json")
            .header(ACCESS_TOKEN_HEADER, token.secret());

        self.http
            .send_json(GET_REPORT, builder)
            .await
            .map_err(FetcherError::Fetch)
    }

    async fn get_document(
        &self,
        token: &AccessToken,
        document_id: &ReportDocumentId,
    ) -> FetcherResult<ReportDocument> {
        let builder = self
            .http
            .inner()
            .get(self.endpoints.document_url(document_id.as_str()))
            .header(ACCEPT, "application/json")
            .header(ACCESS_TOKEN_HEADER, token.secret());

        let document: ReportDocument = self
            .http
            .send_json(GET_DOCUMENT, builder)
            .await
            .map_err(FetcherError::Fetch)?;

        if document.url.is_empty() {
            return Err(FetcherError::Fetch(RequestFailure::InvalidResponse {
                endpoint: GET_DOCUMENT.to_string(),
                message: "document metadata did not contain a download url".to_string(),
            }));
        }
        Ok(document)
    }

    async fn download(&self, document: &ReportDocument) -> FetcherResult<Bytes> {
        debug!(url = %redact_url(&document.url), "Downloading report document");

        // Pre-signed URL: no access token header
        let builder = self
            .http
            .inner()
            .get(&document.url)
            .timeout(Duration::from_secs(HTTP_DOWNLOAD_TIMEOUT_SECS));

        let response = self
            .http
            .send(DOWNLOAD, builder)
            .await
            .map_err(FetcherError::Fetch)?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetcherError::Fetch(network_failure(DOWNLOAD, e)))?;

        debug!(bytes = bytes.len(), "Downloaded report document");
        Ok(bytes)
    }
}
