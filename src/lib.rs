pub mod audio;
pub mod config;
pub mod database;
pub mod error;
pub mod feed;
pub mod sync;
pub mod worker;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use config::{Config, DispatchMode};

/// Fetch a podcast feed and save trimmed copies of new episodes.
#[derive(Debug, Parser)]
#[command(name = "podtrim", version, about)]
pub struct Cli {
    /// URL of the podcast RSS feed
    #[arg(short = 'u', long)]
    pub url: String,

    /// Seconds to cut from the start of each episode
    #[arg(short = 's', long = "start")]
    pub head_skip: Option<u64>,

    /// Seconds to cut from the end of each episode
    #[arg(short = 'e', long = "end")]
    pub tail_skip: Option<u64>,

    /// Maximum number of episodes processed at once
    #[arg(short = 'n', long = "threads")]
    pub max_workers: Option<usize>,

    /// YAML config file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Directory that receives one sub-directory per show
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Return once every episode is dispatched instead of waiting for them
    #[arg(long)]
    pub detach: bool,

    /// Print the sync report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Debug logging (ignored when RUST_LOG is set)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    /// Layer command-line flags over the loaded config.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(secs) = self.head_skip {
            config.head_skip_secs = secs;
        }
        if let Some(secs) = self.tail_skip {
            config.tail_skip_secs = secs;
        }
        if let Some(n) = self.max_workers {
            config.max_workers = n;
        }
        if let Some(path) = &self.db {
            config.database_path = path.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if self.detach {
            config.dispatch = DispatchMode::Detach;
        }
        config
    }
}

pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    // Also installs the `log` bridge, so `log::` macros land here
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Command-line entry point.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => cli.apply(config),
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let result = runtime.block_on(async {
        let ctrl_c_cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, abandoning in-flight downloads");
                ctrl_c_cancel.cancel();
            }
        });

        sync::run_sync(&config, &cli.url, cancel.clone()).await
    });

    match result {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => log::error!("Failed to serialize report: {}", e),
                }
            }
            for failed in &report.failed {
                log::warn!("Left unprocessed: '{}' ({})", failed.title, failed.error);
            }
            if cancel.is_cancelled() {
                ExitCode::from(130)
            } else {
                ExitCode::SUCCESS
            }
        }
        // Feed, store and config failures are fatal
        Err(e) => {
            log::error!("Sync failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
