//! CLI handler for summarizing audio.
//!
//! Selects the input, submits it through the job controller, follows the job
//! until it finishes, and outputs the summary and action items.

use anyhow::{anyhow, bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use crate::cli::args::{OutputFormat, SummarizeCliArgs};
use crate::config::Config;
use crate::jobs::{JobController, JobResult, JobStatus, Summary};
use crate::validation::AudioFile;

/// Handle the summarize CLI command.
pub async fn handle_summarize_command(args: SummarizeCliArgs) -> Result<()> {
    // 1. Resolve configuration
    let mut config = Config::load()?;
    if let Some(api_url) = args.api_url {
        config.api.base_url = api_url;
        config.check()?;
    }
    info!("Submitting to {}", config.api.process_audio_url());

    let controller = JobController::from_config(&config);

    // 2. Validate and select the input before anything is uploaded
    if args.url {
        controller.select_url(&args.input).await?;
    } else {
        let mut file = AudioFile::from_path(Path::new(&args.input))?;
        if let Some(content_type) = args.content_type {
            file = file.with_content_type(content_type);
        }
        controller.select_file(file).await?;
    }

    // 3. Submit with progress indicator
    let pb = (!args.no_progress).then(create_spinner);
    if let Some(pb) = &pb {
        pb.set_message(progress_message(JobStatus::Loading));
    }

    let mut updates = controller.subscribe();
    let run = async {
        controller.submit().await?;
        // 4. Follow the job until it reaches a terminal state
        wait_until_terminal(&mut updates, pb.as_ref()).await
    };

    let waited = match args.timeout.map(Duration::from_secs) {
        Some(limit) => match tokio::time::timeout(limit, run).await {
            Ok(result) => result,
            Err(_) => {
                controller.reset().await;
                Err(anyhow!(
                    "Timed out after {} seconds waiting for the summary",
                    limit.as_secs()
                ))
            }
        },
        None => run.await,
    };

    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    let result = waited?;
    let summary = match result.outcome() {
        Some(summary) => summary,
        None => bail!(
            "{}",
            result
                .error
                .unwrap_or_else(|| "An error occurred".to_string())
        ),
    };

    // 5. Format and output
    let output_text = format_output(&summary, args.format);

    if let Some(output_path) = &args.output {
        std::fs::write(output_path, &output_text).context("Failed to write output file")?;
        eprintln!("Summary saved to: {}", output_path.display());
    } else {
        println!("{}", output_text);
    }

    Ok(())
}

/// Follow published job results until one is terminal.
async fn wait_until_terminal(
    updates: &mut watch::Receiver<JobResult>,
    pb: Option<&ProgressBar>,
) -> Result<JobResult> {
    loop {
        let current = updates.borrow_and_update().clone();
        if let Some(pb) = pb {
            pb.set_message(progress_message(current.status));
        }
        if current.status.is_terminal() {
            return Ok(current);
        }
        updates
            .changed()
            .await
            .context("Job controller stopped before the job finished")?;
    }
}

fn progress_message(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Idle => "Waiting...",
        JobStatus::Loading => "Uploading...",
        JobStatus::Processing => "Processing on server...",
        JobStatus::Completed => "Complete",
        JobStatus::Error => "Failed",
    }
}

/// Create a styled spinner.
fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Format a finished summary according to the requested format.
pub fn format_output(summary: &Summary, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_text(summary),
        OutputFormat::Json => {
            serde_json::to_string_pretty(summary).unwrap_or_else(|_| summary.summary.clone())
        }
    }
}

/// Summary and action items as two titled sections.
fn format_text(summary: &Summary) -> String {
    let mut out = String::new();
    out.push_str("Summary\n=======\n");
    if summary.summary.trim().is_empty() {
        out.push_str("(no summary)\n");
    } else {
        out.push_str(summary.summary.trim());
        out.push('\n');
    }

    out.push_str("\nAction Items\n============\n");
    if summary.action_items.is_empty() {
        out.push_str("(none)");
    } else {
        let items = summary
            .action_items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {}", i + 1, item.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        out.push_str(&items);
    }
    out
}
