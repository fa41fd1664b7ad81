//! # Report Extractor Library
//!
//! Requests reports from the Selling Partner API, waits for them to finish
//! generating, downloads the resulting document and archives it to object
//! storage. Designed to run as a scheduled batch job or from the command line.
//!
//! ## Features
//!
//! - **Report Lifecycle**: request → poll-until-ready → fetch → decode → persist
//! - **Bounded Polling**: fixed attempt budget and fixed inter-poll delay
//! - **Failure Classification**: every failure maps to a single [`error::ErrorClass`]
//! - **Object Storage**: S3 in production, local directory or in-memory stores otherwise
//! - **Type-Safe**: strongly-typed identifiers, statuses and compression indicators
//!
//! ## Quick Start
//!
//! ```no_run
//! use report_extractor::config::{Credentials, ExtractorConfig};
//! use report_extractor::extractor::ReportExtractor;
//! use report_extractor::ReportRequest;
//! use chrono::Utc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = Credentials::from_env()?;
//! let config = ExtractorConfig::new(credentials);
//! let extractor = ReportExtractor::s3(&config)?;
//!
//! let request = ReportRequest::for_previous_month(Utc::now())?;
//! let summary = extractor.run(&request).await?;
//! println!("stored report {}", summary.report_id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`] - Credentials, endpoints, poll settings and defaults
//! - [`fetcher`] - Selling Partner API client (token exchange, reports, documents)
//! - [`poller`] - Report status polling state machine
//! - [`output`] - Artifact decoding and object storage sink
//! - [`extractor`] - End-to-end orchestration of a single run
//! - [`cli`] - Command line entry points (`run` and `invoke`)

#![warn(missing_docs)]
#![warn(clippy::all)]

use bytes::Bytes;
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// CLI command implementations
pub mod cli;

/// Credentials, endpoints and defaults
pub mod config;

/// Crate-level error taxonomy
pub mod error;

/// Single-run orchestration
pub mod extractor;

/// Selling Partner API client
pub mod fetcher;

/// Metrics collection
pub mod metrics;

/// Artifact decoding and persistence
pub mod output;

/// Report status polling
pub mod poller;

pub use error::{ErrorClass, ExtractError, ExtractResult};

/// Report type requested when the caller does not choose one
pub const DEFAULT_REPORT_TYPE: &str = "GET_SALES_AND_TRAFFIC_REPORT";

/// US storefront, used when no marketplace is given
pub const DEFAULT_MARKETPLACE_ID: &str = "ATVPDKIKX0DER";

/// Report type name, e.g. `GET_SALES_AND_TRAFFIC_REPORT`.
///
/// The upstream catalogue of report types is large and grows over time, so
/// this is an open newtype rather than an enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportType(String);

impl ReportType {
    /// Create a report type from its upstream name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Sales and traffic business report
    pub fn sales_and_traffic() -> Self {
        Self::new(DEFAULT_REPORT_TYPE)
    }

    /// Upstream name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReportType {
    fn default() -> Self {
        Self::sales_and_traffic()
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an upstream identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Identifier as received from upstream
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(
    /// Identifier returned when a report is requested; keys every stored artifact
    ReportId
);

opaque_id!(
    /// Identifier of the generated document, present once a report is `DONE`
    ReportDocumentId
);

/// Report generation request
///
/// Fields are fixed at construction; use [`ReportRequest::new`] or
/// [`ReportRequest::for_previous_month`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    report_type: ReportType,
    marketplace_ids: Vec<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl ReportRequest {
    /// Build a request, validating the window and marketplace list.
    ///
    /// Marketplace ids keep their first-seen order; duplicates and blank
    /// entries are dropped. An empty list falls back to
    /// [`DEFAULT_MARKETPLACE_ID`].
    pub fn new<I, S>(
        report_type: ReportType,
        marketplace_ids: I,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if report_type.as_str().trim().is_empty() {
            return Err("Report type cannot be empty".to_string());
        }

        if end <= start {
            return Err(format!(
                "End time ({}) must be after start time ({})",
                format_timestamp(&end),
                format_timestamp(&start)
            ));
        }

        let mut ids: Vec<String> = Vec::new();
        for id in marketplace_ids {
            let id = id.into().trim().to_string();
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            ids.push(DEFAULT_MARKETPLACE_ID.to_string());
        }

        Ok(Self {
            report_type,
            marketplace_ids: ids,
            start,
            end,
        })
    }

    /// Default request: sales and traffic, default marketplace, previous
    /// full calendar month relative to `now`.
    pub fn for_previous_month(now: DateTime<Utc>) -> Result<Self, String> {
        let (start, end) = previous_month_window(now)
            .ok_or_else(|| format!("Cannot derive previous month for {now}"))?;
        Self::new(
            ReportType::default(),
            [DEFAULT_MARKETPLACE_ID],
            start,
            end,
        )
    }

    /// Requested report type
    pub fn report_type(&self) -> &ReportType {
        &self.report_type
    }

    /// Marketplaces covered by the report
    pub fn marketplace_ids(&self) -> &[String] {
        &self.marketplace_ids
    }

    /// Start of the data window
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the data window
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Request body for the report-creation endpoint
    pub fn to_wire(&self) -> CreateReportBody<'_> {
        CreateReportBody {
            marketplace_ids: &self.marketplace_ids,
            report_type: self.report_type.as_str(),
            data_start_time: format_timestamp(&self.start),
            data_end_time: format_timestamp(&self.end),
        }
    }
}

/// JSON body sent to the report-creation endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportBody<'a> {
    /// Marketplace identifiers
    pub marketplace_ids: &'a [String],
    /// Report type name
    pub report_type: &'a str,
    /// RFC 3339 window start
    pub data_start_time: String,
    /// RFC 3339 window end
    pub data_end_time: String,
}

/// First and last second of the calendar month before `now` (UTC)
pub fn previous_month_window(now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first_of_month = now.date_naive().with_day(1)?;
    let last_of_previous = first_of_month.pred_opt()?;
    let first_of_previous = last_of_previous.with_day(1)?;

    let start = first_of_previous.and_hms_opt(0, 0, 0)?.and_utc();
    let end = last_of_previous.and_hms_opt(23, 59, 59)?.and_utc();
    Some((start, end))
}

/// Format a timestamp the way the reports API expects (`2025-05-01T00:00:00Z`)
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Upstream processing status of a report
///
/// Unknown values are preserved in [`ProcessingStatus::Other`] and treated as
/// still in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProcessingStatus {
    /// Waiting to be processed
    InQueue,
    /// Being generated
    InProgress,
    /// Finished; a document is available
    Done,
    /// Cancelled upstream
    Cancelled,
    /// Failed upstream
    Fatal,
    /// Any status this crate does not know about
    Other(String),
}

impl ProcessingStatus {
    /// Upstream spelling
    pub fn as_str(&self) -> &str {
        match self {
            ProcessingStatus::InQueue => "IN_QUEUE",
            ProcessingStatus::InProgress => "IN_PROGRESS",
            ProcessingStatus::Done => "DONE",
            ProcessingStatus::Cancelled => "CANCELLED",
            ProcessingStatus::Fatal => "FATAL",
            ProcessingStatus::Other(s) => s,
        }
    }

    /// `DONE`, `CANCELLED` and `FATAL` end polling
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingStatus::Done | ProcessingStatus::Cancelled | ProcessingStatus::Fatal
        )
    }

    /// Bounded label for metrics; every unrecognized status is `OTHER`
    pub fn metric_label(&self) -> &'static str {
        match self {
            ProcessingStatus::InQueue => "IN_QUEUE",
            ProcessingStatus::InProgress => "IN_PROGRESS",
            ProcessingStatus::Done => "DONE",
            ProcessingStatus::Cancelled => "CANCELLED",
            ProcessingStatus::Fatal => "FATAL",
            ProcessingStatus::Other(_) => "OTHER",
        }
    }
}

impl From<&str> for ProcessingStatus {
    fn from(s: &str) -> Self {
        match s {
            "IN_QUEUE" => ProcessingStatus::InQueue,
            "IN_PROGRESS" => ProcessingStatus::InProgress,
            "DONE" => ProcessingStatus::Done,
            "CANCELLED" => ProcessingStatus::Cancelled,
            "FATAL" => ProcessingStatus::Fatal,
            other => ProcessingStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for ProcessingStatus {
    fn from(s: String) -> Self {
        match ProcessingStatus::from(s.as_str()) {
            ProcessingStatus::Other(_) => ProcessingStatus::Other(s),
            known => known,
        }
    }
}

impl From<ProcessingStatus> for String {
    fn from(status: ProcessingStatus) -> Self {
        match status {
            ProcessingStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One answer from the report-status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStatusSnapshot {
    /// Current status; absent while the upstream has nothing to say
    #[serde(default)]
    pub processing_status: Option<ProcessingStatus>,
    /// Document id, populated once the report is `DONE`
    #[serde(default)]
    pub report_document_id: Option<String>,
}

impl ReportStatusSnapshot {
    /// Snapshot with a status and no document
    pub fn with_status(status: impl Into<ProcessingStatus>) -> Self {
        Self {
            processing_status: Some(status.into()),
            report_document_id: None,
        }
    }

    /// `DONE` snapshot carrying a document id
    pub fn done(document_id: impl Into<String>) -> Self {
        Self {
            processing_status: Some(ProcessingStatus::Done),
            report_document_id: Some(document_id.into()),
        }
    }

    /// Status label for logs; `UNKNOWN` when the field was missing
    pub fn status_label(&self) -> &str {
        self.processing_status
            .as_ref()
            .map(ProcessingStatus::as_str)
            .unwrap_or("UNKNOWN")
    }

    /// Like [`Self::status_label`], but from a fixed set of values
    pub fn metric_label(&self) -> &'static str {
        self.processing_status
            .as_ref()
            .map(ProcessingStatus::metric_label)
            .unwrap_or("UNKNOWN")
    }
}

/// Compression applied to a report document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Compression {
    /// gzip-compressed payload
    Gzip,
    /// Any other algorithm name
    Other(String),
}

impl Compression {
    /// Upstream spelling
    pub fn as_str(&self) -> &str {
        match self {
            Compression::Gzip => "GZIP",
            Compression::Other(s) => s,
        }
    }
}

impl From<String> for Compression {
    fn from(s: String) -> Self {
        if s == "GZIP" {
            Compression::Gzip
        } else {
            Compression::Other(s)
        }
    }
}

impl From<Compression> for String {
    fn from(c: Compression) -> Self {
        match c {
            Compression::Gzip => "GZIP".to_string(),
            Compression::Other(s) => s,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document metadata returned for a [`ReportDocumentId`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    /// Time-limited download URL; never persisted
    pub url: String,
    /// Compression indicator, absent for plain documents
    #[serde(default)]
    pub compression_algorithm: Option<Compression>,
}

/// Document bytes exactly as downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArtifact(Bytes);

impl RawArtifact {
    /// Wrap downloaded bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Underlying bytes
    pub fn bytes(&self) -> &Bytes {
        &self.0
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the download was empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// JSON decoded from a gzip document
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArtifact(serde_json::Value);

impl ParsedArtifact {
    /// Wrap a decoded value
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Decoded value
    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }
}
