//! Command line entry points
//!
//! `invoke` is the scheduled trigger: no arguments, default request, prints
//! the trigger response. `run` is the manual entry with optional overrides.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::config::{
    Credentials, ExtractorConfig, DEFAULT_BUCKET, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TRANSPORT_RETRIES, ENV_BUCKET, MAX_TRANSPORT_RETRIES,
};
use crate::extractor::ReportExtractor;
use crate::fetcher::sp_config::{SpApiEndpoints, SpRegion};
use crate::poller::PollPolicy;
use crate::{previous_month_window, ReportRequest, ReportType};

pub mod error;
pub mod invoke;
pub mod run;

pub use error::CliError;
pub use invoke::InvokeCommand;
pub use run::RunArgs;

/// Selling Partner report extractor CLI
#[derive(Parser, Debug)]
#[command(name = "report-extractor")]
#[command(about = "Request, wait for and archive Selling Partner reports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// API region: na, eu or fe
    #[arg(long, global = true, default_value = "na")]
    pub region: SpRegion,

    /// Override the regional API host
    #[arg(long, global = true)]
    pub api_base_url: Option<String>,

    /// Override the token endpoint
    #[arg(long, global = true)]
    pub token_url: Option<String>,

    /// Bucket for stored artifacts (falls back to REPORTS_BUCKET)
    #[arg(long, global = true)]
    pub bucket: Option<String>,

    /// Write artifacts under this directory instead of S3
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of status queries (default: 10, range: 1-1000)
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub max_attempts: u32,

    /// Seconds to wait between status queries
    #[arg(long, global = true, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub poll_interval_secs: u64,

    /// Extra attempts for transient network, 429 and 5xx failures (default: 0, max: 10)
    #[arg(long, global = true, default_value_t = DEFAULT_TRANSPORT_RETRIES, value_parser = clap::value_parser!(u32).range(0..=MAX_TRANSPORT_RETRIES as i64))]
    pub transport_retries: u32,

    /// Serve Prometheus metrics on this address
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Request a report and archive it, with optional overrides
    Run(RunArgs),

    /// Scheduled trigger: previous month, default report, trigger response on stdout
    Invoke(InvokeCommand),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl Cli {
    /// Endpoints for the selected region, with any overrides applied
    pub fn endpoints(&self) -> SpApiEndpoints {
        let defaults = SpApiEndpoints::for_region(self.region);
        SpApiEndpoints::new(
            self.token_url.as_deref().unwrap_or(defaults.token_url()),
            self.api_base_url
                .as_deref()
                .unwrap_or(defaults.api_base_url()),
        )
    }

    /// Assemble the run configuration
    ///
    /// Credentials and the bucket fallback come from `lookup`, normally the
    /// process environment.
    pub fn extractor_config<F>(&self, lookup: F) -> Result<ExtractorConfig, CliError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = Credentials::from_lookup(&lookup)?;

        let bucket = self
            .bucket
            .clone()
            .or_else(|| lookup(ENV_BUCKET).filter(|b| !b.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_BUCKET.to_string());

        let config = ExtractorConfig::new(credentials)
            .with_endpoints(self.endpoints())
            .with_bucket(bucket)
            .with_poll(PollPolicy::new(
                self.max_attempts,
                Duration::from_secs(self.poll_interval_secs),
            ))
            .with_transport_retries(self.transport_retries);
        config.validate()?;

        info!(
            region = %self.region,
            api = %config.endpoints.api_base_url(),
            bucket = %config.bucket,
            max_attempts = config.poll.max_attempts(),
            poll_interval_secs = self.poll_interval_secs,
            transport_retries = config.transport_retries,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Extractor writing to S3, or to `--output-dir` when given
    pub fn build_extractor(&self, config: &ExtractorConfig) -> Result<ReportExtractor, CliError> {
        let extractor = match &self.output_dir {
            Some(dir) => ReportExtractor::local(config, dir.clone())?,
            None => ReportExtractor::s3(config)?,
        };
        Ok(extractor)
    }

    /// Marketplace used when none is requested
    pub fn default_marketplace(&self) -> &'static str {
        self.region.config().default_marketplace_id
    }

    /// Default request: default report type and the previous calendar month
    pub fn default_request(&self, now: DateTime<Utc>) -> Result<ReportRequest, CliError> {
        let (start, end) = previous_month_window(now).ok_or_else(|| {
            CliError::InvalidArgument(format!("Cannot derive previous month for {now}"))
        })?;
        ReportRequest::new(ReportType::default(), [self.default_marketplace()], start, end)
            .map_err(CliError::InvalidArgument)
    }
}
