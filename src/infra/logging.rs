use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_ENV: &str = "TREK_LOG";
const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum InitLoggingError {
    #[error("failed to open log file {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Routes `tracing` events to the file named by `TREK_LOG`, if any.
///
/// The terminal belongs to the UI, so nothing is logged when the variable is unset.
pub fn init_logging() -> Result<Option<PathBuf>, InitLoggingError> {
    let Some(path) = std::env::var_os(LOG_FILE_ENV).map(PathBuf::from) else {
        return Ok(None);
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|error| InitLoggingError::Open {
            path: path.display().to_string(),
            source: error,
        })?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|error| InitLoggingError::Install(error.to_string()))?;

    Ok(Some(path))
}
