//! bucket-mirror - mirror an S3 bucket to the local filesystem
//!
//! Downloads every object of one bucket into a folder named after it.
//! Works with AWS S3 and S3-compatible services.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod exit_code;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    // A missing .env is fine; a malformed one is worth a warning
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        eprintln!("Warning: failed to load .env file: {err}");
    }

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let exit_code = commands::execute(cli).await;

    std::process::exit(exit_code.as_i32());
}

/// Log to stderr so stdout stays reserved for console lines and JSON
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
