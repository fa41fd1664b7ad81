//! Run metrics for the report extractor
//!
//! Counters and histograms cover every outbound request, transport retries,
//! status polls, stored artifacts and whole runs.
//!
//! ## Architecture
//!
//! - Uses `metrics` crate macros; without an installed recorder they are no-ops
//! - Prometheus exporter is opt-in (`--metrics-addr`) for long-lived hosts
//! - Every recording helper is synchronous and safe to call from any task

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::ErrorClass;

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<RwLock<bool>> = Lazy::new(|| RwLock::new(false));

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize the Prometheus exporter
///
/// Idempotent: later calls return `Ok(())` without rebinding.
///
/// # Arguments
/// * `addr` - Socket address for the scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "sp_api_requests_total",
        Unit::Count,
        "Total number of HTTP requests made to the Selling Partner API"
    );

    describe_histogram!(
        "sp_api_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );

    describe_counter!(
        "sp_api_throttled_total",
        Unit::Count,
        "Total number of 429 responses received"
    );

    describe_counter!(
        "sp_api_retries_total",
        Unit::Count,
        "Total number of transport retry attempts"
    );

    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Duration of retry backoff in seconds"
    );

    describe_counter!(
        "report_status_polls_total",
        Unit::Count,
        "Status queries by observed processing status"
    );

    describe_counter!(
        "artifacts_stored_total",
        Unit::Count,
        "Objects written to the artifact store"
    );

    describe_counter!(
        "artifact_bytes_stored_total",
        Unit::Bytes,
        "Bytes written to the artifact store"
    );

    describe_counter!(
        "extraction_runs_total",
        Unit::Count,
        "Extraction runs by outcome"
    );

    describe_histogram!(
        "extraction_run_duration_seconds",
        Unit::Seconds,
        "Wall-clock duration of extraction runs"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if the exporter has been installed
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing and outcome of one HTTP attempt
pub struct HttpRequestMetrics {
    endpoint: String,
    start_time: Instant,
    correlation_id: String,
    attempt: u32,
}

impl HttpRequestMetrics {
    /// Start recording an attempt against a logical endpoint
    pub fn start(endpoint: impl Into<String>, attempt: u32) -> Self {
        let endpoint = endpoint.into();
        let correlation_id = generate_correlation_id();

        debug!(
            correlation_id = %correlation_id,
            endpoint = %endpoint,
            attempt = attempt,
            "Starting HTTP request metrics"
        );

        Self {
            endpoint,
            start_time: Instant::now(),
            correlation_id,
            attempt,
        }
    }

    /// Record completion with an HTTP status
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "sp_api_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => status_code.to_string(),
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);

        histogram!(
            "sp_api_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());

        if status_code == 429 {
            counter!(
                "sp_api_throttled_total",
                "endpoint" => self.endpoint.clone(),
            )
            .increment(1);

            warn!(
                correlation_id = %self.correlation_id,
                endpoint = %self.endpoint,
                attempt = self.attempt,
                duration_ms = duration.as_millis(),
                "Throttled (429)"
            );
        }

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            status = status_code,
            duration_ms = duration.as_millis(),
            "HTTP request completed"
        );
    }

    /// Record a network error (no status code)
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "sp_api_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => "network_error",
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);

        histogram!(
            "sp_api_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());

        warn!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            attempt = self.attempt,
            duration_ms = duration.as_millis(),
            "Network error recorded"
        );
    }

    /// Get the correlation ID for this request
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record transport retry backoff
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!(
        "sp_api_retries_total",
        "attempt" => attempt.to_string(),
    )
    .increment(1);

    histogram!(
        "retry_backoff_duration_seconds",
        "attempt" => attempt.to_string(),
    )
    .record(duration.as_secs_f64());

    debug!(
        attempt = attempt,
        backoff_ms = duration.as_millis(),
        "Retry backoff recorded"
    );
}

/// Record one status query and the status it observed
pub fn record_poll_attempt(status: &str) {
    counter!(
        "report_status_polls_total",
        "status" => status.to_string(),
    )
    .increment(1);
}

/// Record an object written to the artifact store
pub fn record_artifact_stored(kind: &'static str, bytes: usize) {
    counter!("artifacts_stored_total", "kind" => kind).increment(1);
    counter!("artifact_bytes_stored_total", "kind" => kind).increment(bytes as u64);
}

/// Whole-run metrics
pub struct RunMetrics {
    report_type: String,
    start_time: Instant,
}

impl RunMetrics {
    /// Start tracking a run
    pub fn start(report_type: impl Into<String>) -> Self {
        let report_type = report_type.into();
        info!(report_type = %report_type, "Extraction run started");

        Self {
            report_type,
            start_time: Instant::now(),
        }
    }

    /// Record a completed run
    pub fn record_success(&self, raw_bytes: usize) {
        let duration = self.start_time.elapsed();

        counter!(
            "extraction_runs_total",
            "report_type" => self.report_type.clone(),
            "outcome" => "success",
        )
        .increment(1);
        histogram!("extraction_run_duration_seconds").record(duration.as_secs_f64());

        info!(
            report_type = %self.report_type,
            raw_bytes,
            duration_secs = duration.as_secs(),
            "Extraction completed successfully"
        );
    }

    /// Record a failed run
    pub fn record_failure(&self, class: ErrorClass) {
        let duration = self.start_time.elapsed();

        counter!(
            "extraction_runs_total",
            "report_type" => self.report_type.clone(),
            "outcome" => class.as_str(),
        )
        .increment(1);
        histogram!("extraction_run_duration_seconds").record(duration.as_secs_f64());

        warn!(
            report_type = %self.report_type,
            error_class = %class,
            duration_secs = duration.as_secs(),
            "Extraction failed"
        );
    }
}
