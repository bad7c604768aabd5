//! Tracing setup. The terminal belongs to the UI, so events go to a file.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::domain::TVError;

/// Install the global subscriber, appending to `log_file`.
///
/// `RUST_LOG` takes precedence over `level` when it is set.
pub fn init_logging(log_file: &Path, level: &str) -> Result<(), TVError> {
    let filter = build_filter(level)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| TVError::LoggingFailed(e.to_string()))
}

fn build_filter(level: &str) -> Result<EnvFilter, TVError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{}={level}", env!("CARGO_CRATE_NAME"))))
        .map_err(|e| TVError::LoggingFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritable_log_file_is_an_io_error() {
        let result = init_logging(Path::new("/nonexistent-xtv-dir/sub/xtv.log"), "info");
        assert!(matches!(result, Err(TVError::IoError(_))));
    }

    #[test]
    fn level_filter() {
        assert!(build_filter("debug").is_ok());
        assert!(build_filter("trace").is_ok());
    }
}
