//! Image Deployer - Entry Point
//!
//! Uploads a dedicated server build and pushes it through the Multiplay
//! image pipeline. Exits non-zero on any fatal error.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use imgdeploy::app::options::DeployOptions;
use imgdeploy::app::run::run;
use imgdeploy::config::settings::{ApiSettings, ImageSlot, DEFAULT_API_HOST};
use imgdeploy::logs::{init_logging, LogLevel, LogOptions};
use imgdeploy::pipeline::poller::PollOptions;
use imgdeploy::pipeline::report::ConsoleReporter;
use imgdeploy::utils::version_info;

#[derive(Parser, Debug)]
#[command(name = "imgdeploy")]
#[command(about = "Deploy your dedicated game server to Multiplay")]
struct Cli {
    /// AWS Secrets Manager secret holding the credentials
    #[arg(long)]
    secret_name: Option<String>,

    /// Create a full image version even if a diff exists. Worth doing now and then.
    #[arg(long)]
    full_deploy: bool,

    /// Directory of the dedicated server build on this machine
    #[arg(long)]
    server_path: PathBuf,

    /// Version of the game server
    #[arg(long = "version")]
    build_version: String,

    /// S3 bucket used to host the dedicated server files
    #[arg(long = "s3-bucket-name")]
    bucket_name: String,

    /// Image to deploy to
    #[arg(long, value_enum)]
    image: ImageSlot,

    /// Image API host
    #[arg(long, env = "MULTIPLAY_HOST", default_value = DEFAULT_API_HOST)]
    api_host: String,

    /// Seconds between two status polls
    #[arg(long, default_value_t = 1)]
    poll_interval_secs: u64,

    /// Abandon a stage that has not finished after this many seconds
    #[arg(long)]
    stage_timeout_secs: Option<u64>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn into_options(self) -> DeployOptions {
        let mut options = DeployOptions::new(
            self.server_path,
            self.build_version,
            self.bucket_name,
            self.image,
        );
        options.full_deploy = self.full_deploy;
        options.secret_name = self.secret_name;
        options.api = ApiSettings {
            host: self.api_host,
            ..ApiSettings::default()
        };
        options.poll = PollOptions {
            interval: Duration::from_secs(self.poll_interval_secs),
            deadline: self.stage_timeout_secs.map(Duration::from_secs),
        };
        options
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_options = LogOptions {
        log_level: cli.log_level,
        json_format: cli.log_json,
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let version = version_info();
    info!(
        "imgdeploy {} ({}, built {})",
        version.version, version.git_hash, version.build_time
    );

    let options = cli.into_options();
    match run(options, Arc::new(ConsoleReporter), await_shutdown_signal()).await {
        Ok(result) => {
            println!("{}", ConsoleReporter::banner(&result));
        }
        Err(e) => {
            error!("Deployment failed: {}", e);
            eprintln!("\n[ERROR] Deployment failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                return std::future::pending().await;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, shutting down...");
        } else {
            std::future::pending::<()>().await;
        }
    }
}
