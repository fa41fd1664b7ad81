//! `run` command: manual extraction with optional overrides

use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;

use super::{Cli, CliError, OutputFormat};
use crate::extractor::RunSummary;
use crate::{previous_month_window, ReportRequest, ReportType, DEFAULT_REPORT_TYPE};

/// Try to parse datetime from RFC3339 format
///
/// Handles both inputs with and without timezone designators:
/// - "2024-01-01T00:00:00Z" - explicit UTC
/// - "2024-01-01T00:00:00+01:00" - explicit offset
/// - "2024-01-01T00:00:00" - no timezone, assumed UTC
fn try_parse_datetime_rfc3339(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&format!("{input}Z")) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

/// Parse a start time from YYYY-MM-DD or RFC3339 datetime format.
///
/// For date-only format, uses start-of-day (00:00:00 UTC).
fn parse_start_time_flexible(input: &str) -> Result<DateTime<Utc>, CliError> {
    if let Some(ts) = try_parse_datetime_rfc3339(input) {
        return Ok(ts);
    }

    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| CliError::InvalidArgument(format!("Invalid start time: {e}")))?;
    let datetime = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CliError::InvalidArgument("Invalid start time".to_string()))?;
    Ok(datetime.and_utc())
}

/// Parse an end time from YYYY-MM-DD or RFC3339 datetime format.
///
/// For date-only format, uses the last second of the day (23:59:59 UTC) so
/// the specified date is fully included.
fn parse_end_time_flexible(input: &str) -> Result<DateTime<Utc>, CliError> {
    if let Some(ts) = try_parse_datetime_rfc3339(input) {
        return Ok(ts);
    }

    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| CliError::InvalidArgument(format!("Invalid end time: {e}")))?;
    let datetime = date
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| CliError::InvalidArgument("Invalid end time".to_string()))?;
    Ok(datetime.and_utc())
}

/// Arguments for a manual run
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Report type (default: GET_SALES_AND_TRAFFIC_REPORT)
    #[arg(long)]
    pub report_type: Option<String>,

    /// Marketplace id; repeat for several (default: the region's storefront)
    #[arg(long = "marketplace")]
    pub marketplaces: Vec<String>,

    /// Window start (YYYY-MM-DD or RFC3339; default: first day of previous month)
    #[arg(long)]
    pub start_time: Option<String>,

    /// Window end (YYYY-MM-DD or RFC3339; default: last day of previous month)
    #[arg(long)]
    pub end_time: Option<String>,
}

impl RunArgs {
    /// Build the report request, filling gaps with defaults relative to `now`
    pub fn to_request(&self, cli: &Cli, now: DateTime<Utc>) -> Result<ReportRequest, CliError> {
        let (default_start, default_end) = previous_month_window(now).ok_or_else(|| {
            CliError::InvalidArgument(format!("Cannot derive previous month for {now}"))
        })?;

        let start = match &self.start_time {
            Some(s) => parse_start_time_flexible(s)?,
            None => default_start,
        };
        let end = match &self.end_time {
            Some(s) => parse_end_time_flexible(s)?,
            None => default_end,
        };

        let report_type = ReportType::new(
            self.report_type
                .as_deref()
                .unwrap_or(DEFAULT_REPORT_TYPE),
        );

        let marketplaces = if self.marketplaces.is_empty() {
            vec![cli.default_marketplace().to_string()]
        } else {
            self.marketplaces.clone()
        };

        ReportRequest::new(report_type, marketplaces, start, end).map_err(CliError::InvalidArgument)
    }

    /// Execute the run and print the summary
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let request = self.to_request(cli, Utc::now())?;
        let config = cli.extractor_config(|key| std::env::var(key).ok())?;
        let extractor = cli.build_extractor(&config)?;

        let summary = extractor.run(&request).await?;

        match cli.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string(&summary)?),
            OutputFormat::Human => output_human(&summary),
        }
        Ok(())
    }
}

fn output_human(summary: &RunSummary) {
    println!("\nReport extraction completed successfully!");
    println!("Report: {}", summary.report_id);
    println!("Document: {}", summary.document_id);
    println!("Raw: {}/{} ({} bytes)", summary.bucket, summary.raw_key, summary.raw_bytes);
    match &summary.parsed_key {
        Some(key) => println!("Parsed: {}/{}", summary.bucket, key),
        None => println!(
            "Parsed: skipped (compression: {})",
            summary
                .compression
                .as_ref()
                .map(|c| c.as_str())
                .unwrap_or("none")
        ),
    }
}
