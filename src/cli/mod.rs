use crate::config::Config;
use crate::jobs::{RuntimeStatus, Summary, SummaryClient};
use anyhow::{Context, Result};

pub mod args;
pub mod summarize;

pub use args::{Cli, CliCommand, OutputFormat, StatusCliArgs, SummarizeCliArgs};
pub use summarize::handle_summarize_command;

/// Query a job's status address once and print what the server reports.
pub async fn handle_status_command(args: StatusCliArgs) -> Result<()> {
    let config = Config::load()?;
    let client = SummaryClient::from_config(&config.api);

    let response = client
        .get_status(&args.status_uri)
        .await
        .context("Failed to query job status")?;

    if let Some(instance_id) = &response.instance_id {
        println!("Instance: {}", instance_id);
    }
    println!("Runtime status: {}", response.runtime_status);
    if let Some(updated) = &response.last_updated_time {
        println!("Last updated: {}", updated);
    }

    match &response.runtime_status {
        RuntimeStatus::Completed => {
            let summary = Summary::from_output(response.output.as_ref());
            println!();
            println!("{}", summarize::format_output(&summary, args.format));
        }
        status if status.is_failure() => {
            if let Some(detail) = response.failure_detail() {
                println!("Reason: {}", detail);
            }
        }
        _ => {}
    }

    Ok(())
}

/// Print the effective configuration and where it was loaded from.
pub fn handle_config_command() -> Result<()> {
    let config = Config::load()?;
    let path = Config::config_path()?;
    let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;

    println!("# {}", path.display());
    println!("{}", content);
    println!("Submit endpoint: {}", config.api.process_audio_url());

    Ok(())
}
