//! Process-wide log sink.
//!
//! One subscriber is built at startup: a log file truncated on every run plus
//! a console echo on stderr. Components log through `tracing` macros; their
//! module path is the logger name (`labtool::io::invoker`, ...).
//!
//! The binary installs the subscriber globally with [`init`]. Tests build one
//! with [`build`] and scope it with `tracing::subscriber::with_default`.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// How the log sink is set up.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// File to (re)create; `None` disables file logging.
    pub file: Option<PathBuf>,
    /// Default filter directive, e.g. `debug` or `labtool=debug`.
    pub level: String,
    /// Echo `info` and above to stderr.
    pub console: bool,
    /// Let `RUST_LOG` replace `level` when set.
    pub env_override: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            file: Some(PathBuf::from("labtool.log")),
            level: "debug".to_string(),
            console: true,
            env_override: true,
        }
    }
}

/// Build the subscriber without installing it.
///
/// Creating the file truncates any log left by a previous run.
pub fn build(options: &LogOptions) -> Result<impl Subscriber + Send + Sync + 'static> {
    let filter = if options.env_override {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&options.level))
    } else {
        EnvFilter::new(&options.level)
    };

    let file_layer = match &options.file {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        None => None,
    };

    let console_layer = options.console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(false)
            .with_filter(LevelFilter::INFO)
    });

    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer))
}

/// Build and install the subscriber as the process-wide default.
///
/// # Example
/// ```bash
/// RUST_LOG=labtool=trace labtool block-wallpaper
/// ```
pub fn init(options: &LogOptions) -> Result<()> {
    build(options)?
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}
