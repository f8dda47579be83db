//! CLI definition and execution
//!
//! Running `bucket-mirror` without a subcommand mirrors a bucket. The only
//! subcommand generates shell completions.

use clap::{Parser, Subcommand};

use crate::exit_code::ExitCode;
use crate::output::OutputConfig;

mod completions;
pub mod mirror;

/// bucket-mirror - copy an object storage bucket to the local filesystem
///
/// Every object in the bucket is downloaded under ./<bucket>, with key
/// separators turned into directories. Existing local files are overwritten.
#[derive(Parser, Debug)]
#[command(name = "bucket-mirror")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(flatten)]
    pub mirror: mirror::MirrorArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    match cli.command {
        Some(Commands::Completions(args)) => completions::execute(args),
        None => mirror::execute(cli.mirror, output_config).await,
    }
}
