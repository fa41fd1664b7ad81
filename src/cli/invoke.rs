//! `invoke` command: the scheduled trigger

use chrono::Utc;
use clap::Parser;

use super::{Cli, CliError};
use crate::extractor::TriggerResponse;

/// Scheduled trigger; takes no arguments
#[derive(Parser, Debug, Default)]
pub struct InvokeCommand {}

impl InvokeCommand {
    /// Run with every request field at its default and print the trigger response
    ///
    /// Always prints JSON: the response is the trigger's return value.
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let request = cli.default_request(Utc::now())?;
        let config = cli.extractor_config(|key| std::env::var(key).ok())?;
        let extractor = cli.build_extractor(&config)?;

        let summary = extractor.run(&request).await?;

        let response = TriggerResponse::from_summary(&summary)?;
        println!("{}", serde_json::to_string(&response)?);
        Ok(())
    }
}
