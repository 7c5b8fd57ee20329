//! Logging configuration

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::DeployError;

/// HTTP stack crates that are only interesting when explicitly asked for
const QUIET_TARGETS: &[&str] = &["hyper_util", "reqwest", "rustls"];

/// Verbosity selectable on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[value(alias = "warning")]
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Logging options
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub log_level: LogLevel,

    /// One JSON object per event instead of human-readable lines
    pub json_format: bool,

    /// Include module targets in each line
    pub with_target: bool,
}

impl LogOptions {
    /// Filter directives used when `RUST_LOG` is unset
    pub fn default_directives(&self) -> String {
        let level = LevelFilter::from(self.log_level);
        let mut directives = vec![level.to_string().to_lowercase()];
        if level < LevelFilter::DEBUG {
            directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
        }
        directives.join(",")
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `options.log_level`.
pub fn init_logging(options: LogOptions) -> Result<(), DeployError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(options.default_directives()))
        .map_err(|e| DeployError::ConfigError(format!("invalid log filter: {e}")))?;

    let json = options
        .json_format
        .then(|| fmt::layer().json().with_target(options.with_target));
    let text = (!options.json_format).then(|| fmt::layer().with_target(options.with_target));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .try_init()
        .map_err(|e| DeployError::ConfigError(e.to_string()))
}
