use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "podsum")]
#[command(about = "Summarize audio and extract action items", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Upload an audio file (or media URL) and wait for its summary
    Summarize(SummarizeCliArgs),
    /// Query the status address of a running job once
    Status(StatusCliArgs),
    /// Show the effective configuration
    Config,
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct SummarizeCliArgs {
    /// Audio file to upload, or a media URL with --url
    pub input: String,
    /// Treat INPUT as a media URL instead of a file path
    #[arg(long)]
    pub url: bool,
    /// Override the API base URL
    #[arg(long)]
    pub api_url: Option<String>,
    /// Report this content type instead of guessing it from the extension
    #[arg(long)]
    pub content_type: Option<String>,
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
    /// Write the result to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Give up after this many seconds, upload included
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Hide the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(ClapArgs, Debug)]
pub struct StatusCliArgs {
    /// Status query address returned when the job was accepted
    pub status_uri: String,
    /// Output format for a completed result
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
