//! mirror command - Download a whole bucket
//!
//! Lists the bucket once and writes every object under `<dest>/<bucket>`,
//! printing one line per step. Per-object failures are printed and skipped.

use std::path::PathBuf;

use bm_core::{
    destination_root, BucketName, Config, ConfigManager, Error, Mirror, MirrorEvent,
    MirrorObserver, ParentDirs, Result,
};
use bm_s3::S3Client;
use clap::Args;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Mirror a bucket to the local filesystem
#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// Name of the bucket to mirror
    #[arg(short, long, env = "MIRROR_BUCKET", default_value = "bucketName")]
    pub bucket: String,

    /// Directory in which the bucket folder is created [default: .]
    #[arg(short, long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// AWS region (overrides AWS_REGION and the config file)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom endpoint URL for S3-compatible services
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long)]
    pub path_style: bool,

    /// Only create the bucket folder before writing files; nested keys
    /// then need directory markers earlier in the listing
    #[arg(long)]
    pub strict_parents: bool,

    /// Configuration file [default: <config dir>/bucket-mirror/config.toml]
    #[arg(long, env = "BUCKET_MIRROR_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Execute the mirror command
pub async fn execute(args: MirrorArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());

    let bucket = match BucketName::new(args.bucket.as_str()) {
        Ok(b) => b,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::UsageError;
        }
    };

    let config = match resolve_config(&args) {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to load configuration: {e}"));
            return ExitCode::from(&e);
        }
    };

    if !formatter.is_json() {
        formatter.println(&format!("bucket name: {bucket}"));
    }

    let client = match S3Client::new(&config.backend).await {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("error while creating session: {e}"));
            return ExitCode::from(&e);
        }
    };

    let parent_dirs = if config.mirror.create_parents {
        ParentDirs::CreateAll
    } else {
        ParentDirs::Literal
    };
    let root = destination_root(&config.mirror.destination, &bucket);
    let mirror = Mirror::new(&client, bucket, root).with_parent_dirs(parent_dirs);

    let mut console = ConsoleObserver::new(output_config);

    let Some(result) = until_interrupted(mirror.run(&mut console), tokio::signal::ctrl_c()).await
    else {
        console.abandon();
        formatter.error("interrupted");
        return ExitCode::Interrupted;
    };

    match result {
        Ok(_) => ExitCode::Success,
        Err(Error::ListingFailed { source, .. }) => {
            formatter.error(&format!("error while listing objects: {source}"));
            ExitCode::from(source.as_ref())
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from(&e)
        }
    }
}

/// Run `task` unless `signal` fires first
///
/// A signal future that fails disables interruption instead of triggering it.
async fn until_interrupted<T>(
    task: impl Future<Output = T>,
    signal: impl Future<Output = std::io::Result<()>>,
) -> Option<T> {
    tokio::select! {
        output = task => Some(output),
        Ok(()) = signal => None,
    }
}

/// Layer the config file, environment and flags, in that order
fn resolve_config(args: &MirrorArgs) -> Result<Config> {
    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new()?,
    };

    let mut config = manager.load()?;
    config.backend.apply_env();
    apply_flags(&mut config, args);
    config.backend.validate()?;

    tracing::debug!(
        config_path = %manager.config_path().display(),
        region = %config.backend.region,
        endpoint = config.backend.endpoint.as_deref().unwrap_or("default"),
        destination = %config.mirror.destination.display(),
        create_parents = config.mirror.create_parents,
        "resolved configuration"
    );

    Ok(config)
}

fn apply_flags(config: &mut Config, args: &MirrorArgs) {
    if let Some(region) = &args.region {
        config.backend.region = region.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.backend.endpoint = Some(endpoint.clone());
    }
    if args.path_style {
        config.backend.force_path_style = true;
    }
    if let Some(dest) = &args.dest {
        config.mirror.destination = dest.clone();
    }
    if args.strict_parents {
        config.mirror.create_parents = false;
    }
}

/// Console line for an event, or None if the event prints nothing
fn describe(event: &MirrorEvent) -> Option<String> {
    match event {
        MirrorEvent::Listed { .. } => None,
        MirrorEvent::Object { key } => Some(format!("object: {key}")),
        MirrorEvent::CreatingFolder { key } => Some(format!("creating folder: {key}")),
        MirrorEvent::Downloading { key } => Some(format!("downloading object: {key}")),
        MirrorEvent::Downloaded { key, .. } => {
            Some(format!("object downloaded successfully: {key}"))
        }
        MirrorEvent::Failed { phase, error, .. } => Some(format!("error while {phase}: {error}")),
        MirrorEvent::Done { .. } => Some("done".to_string()),
    }
}

/// Warning printed before mirroring a truncated listing
fn truncation_warning(event: &MirrorEvent) -> Option<String> {
    match event {
        MirrorEvent::Listed {
            count,
            truncated: true,
            ..
        } => Some(format!(
            "Listing was truncated: only the first {count} objects will be mirrored"
        )),
        _ => None,
    }
}

/// Prints mirror events as console lines or JSON
struct ConsoleObserver {
    formatter: Formatter,
    config: OutputConfig,
    progress: Option<ProgressBar>,
}

impl ConsoleObserver {
    fn new(config: OutputConfig) -> Self {
        Self {
            formatter: Formatter::new(config.clone()),
            config,
            progress: None,
        }
    }

    fn print(&self, f: impl FnOnce(&Formatter)) {
        match &self.progress {
            Some(progress) => progress.suspend(|| f(&self.formatter)),
            None => f(&self.formatter),
        }
    }

    fn abandon(&mut self) {
        if let Some(progress) = self.progress.take() {
            progress.finish_and_clear();
        }
    }
}

impl MirrorObserver for ConsoleObserver {
    fn on_event(&mut self, event: &MirrorEvent) {
        if self.formatter.is_json() {
            self.formatter.json_line(event);
            return;
        }

        if let Some(warning) = truncation_warning(event) {
            self.formatter.warning(&warning);
        }

        match event {
            MirrorEvent::Listed { count, .. } => {
                let bar = ProgressBar::new(&self.config, *count as u64);
                self.progress = bar.is_visible().then_some(bar);
            }
            MirrorEvent::Done { .. } => self.abandon(),
            MirrorEvent::Object { .. } => {
                if let Some(progress) = &self.progress {
                    progress.inc(1);
                }
            }
            _ => {}
        }

        if let Some(line) = describe(event) {
            match event {
                MirrorEvent::Failed { .. } => self.print(|f| f.error(&line)),
                _ => self.print(|f| f.println(&line)),
            }
        }
    }
}
