//! End-to-end orchestration of one extraction run
//!
//! token → create report → poll → fetch document → store raw →
//! (GZIP only) decode + store parsed.
//!
//! Every step consumes the previous step's value. Any failure propagates
//! unchanged; a document stored raw stays stored even if decoding fails.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ConfigError, Credentials, ExtractorConfig};
use crate::fetcher::{ReportsApi, SpReportsClient};
use crate::metrics::RunMetrics;
use crate::output::{
    decode_gzip_json, ArtifactSink, BucketStores, LocalBuckets, OutputError, S3Buckets,
};
use crate::poller::ReportPoller;
use crate::{Compression, ExtractResult, ReportDocumentId, ReportId, ReportRequest};

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Report created for this run
    pub report_id: ReportId,
    /// Document produced by the report
    pub document_id: ReportDocumentId,
    /// Compression indicator from the document metadata
    pub compression: Option<Compression>,
    /// Bucket the artifacts were written to
    pub bucket: String,
    /// Key of the raw document
    pub raw_key: String,
    /// Key of the decoded document, when one was written
    pub parsed_key: Option<String>,
    /// Size of the raw document
    pub raw_bytes: usize,
}

/// Response returned by the scheduled trigger
///
/// `body` is a JSON string holding exactly `report_id` and `document_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerResponse {
    /// Always 200; failures exit non-zero instead
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Serialized `{report_id, document_id}`
    pub body: String,
}

#[derive(Serialize)]
struct TriggerBody<'a> {
    report_id: &'a ReportId,
    document_id: &'a ReportDocumentId,
}

impl TriggerResponse {
    /// Success response for a completed run
    pub fn from_summary(summary: &RunSummary) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_string(&TriggerBody {
            report_id: &summary.report_id,
            document_id: &summary.document_id,
        })?;
        Ok(Self {
            status_code: 200,
            body,
        })
    }
}

/// Runs the report lifecycle against an API and a sink
pub struct ReportExtractor {
    credentials: Credentials,
    api: Arc<dyn ReportsApi>,
    poller: ReportPoller,
    sink: ArtifactSink,
}

impl ReportExtractor {
    /// Assemble an extractor from its parts
    pub fn new(
        credentials: Credentials,
        api: Arc<dyn ReportsApi>,
        poller: ReportPoller,
        sink: ArtifactSink,
    ) -> Self {
        Self {
            credentials,
            api,
            poller,
            sink,
        }
    }

    /// Live API, artifacts to S3
    pub fn s3(config: &ExtractorConfig) -> ExtractResult<Self> {
        Self::with_stores(config, Arc::new(S3Buckets))
    }

    /// Live API, artifacts under a local directory
    pub fn local(config: &ExtractorConfig, root: impl Into<PathBuf>) -> ExtractResult<Self> {
        Self::with_stores(config, Arc::new(LocalBuckets::new(root)))
    }

    /// Live API, artifacts to the given stores
    pub fn with_stores(
        config: &ExtractorConfig,
        stores: Arc<dyn BucketStores>,
    ) -> ExtractResult<Self> {
        config.validate()?;

        let api = SpReportsClient::connect(config.endpoints.clone(), config.transport_retries)
            .map_err(|e| ConfigError::InvalidSetting(format!("cannot build HTTP client: {e}")))?;

        Ok(Self::new(
            config.credentials.clone(),
            Arc::new(api),
            ReportPoller::new(config.poll),
            ArtifactSink::new(stores, config.bucket.clone()),
        ))
    }

    /// Execute one run
    ///
    /// # Errors
    /// The first failing step's error, classified by [`crate::ExtractError::class`]
    pub async fn run(&self, request: &ReportRequest) -> ExtractResult<RunSummary> {
        let metrics = RunMetrics::start(request.report_type().as_str());

        match self.execute(request).await {
            Ok(summary) => {
                metrics.record_success(summary.raw_bytes);
                Ok(summary)
            }
            Err(e) => {
                metrics.record_failure(e.class());
                Err(e)
            }
        }
    }

    async fn execute(&self, request: &ReportRequest) -> ExtractResult<RunSummary> {
        info!(
            report_type = %request.report_type(),
            bucket = %self.sink.default_bucket(),
            "Starting extraction"
        );

        let token = self.api.access_token(&self.credentials).await?;

        let report_id = self.api.create_report(&token, request).await?;

        let document_id = self
            .poller
            .wait_for_document(self.api.as_ref(), &token, &report_id)
            .await?;

        let (raw, compression) = self.api.fetch_document(&token, &document_id).await?;
        if raw.is_empty() {
            warn!(report_id = %report_id, "Downloaded document is empty");
        } else {
            info!(report_id = %report_id, bytes = raw.len(), "Document downloaded");
        }

        let raw_stored = self.sink.store_raw(&raw, &report_id, None).await?;

        let parsed_key = match &compression {
            Some(Compression::Gzip) => {
                let parsed = decode_gzip_json(&raw).map_err(OutputError::from)?;
                let stored = self.sink.store_parsed(&parsed, &report_id, None).await?;
                Some(stored.key)
            }
            Some(other) => {
                warn!(
                    report_id = %report_id,
                    compression = %other,
                    "Unsupported compression; raw document kept, parse skipped"
                );
                None
            }
            None => {
                info!(report_id = %report_id, "Document not compressed; parse skipped");
                None
            }
        };

        info!(
            report_id = %report_id,
            document_id = %document_id,
            raw_key = %raw_stored.key,
            parsed = parsed_key.is_some(),
            "Report extracted"
        );

        Ok(RunSummary {
            report_id,
            document_id,
            compression,
            bucket: raw_stored.bucket,
            raw_key: raw_stored.key,
            parsed_key,
            raw_bytes: raw_stored.size,
        })
    }
}
