use crate::config::LoggingSettings;
use crate::error::{BridgeError, Result};
use std::path::PathBuf;
use std::sync::Once;
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, registry::Registry};

static LOGGER_INIT: Once = Once::new();

const LOG_FILE_NAME: &str = "bridge.log";

/// Initialize bridge logging - NEVER logs to stdout.
///
/// Standard output carries the JSON-RPC stream, so every layer writes to
/// stderr or to the optional log file.
pub fn init_bridge_logging(settings: &LoggingSettings, log_dir: PathBuf) -> Result<()> {
    let mut init_result = Ok(());

    LOGGER_INIT.call_once(|| {
        init_result = init_logging_internal(settings, log_dir);
    });

    init_result
}

fn init_logging_internal(settings: &LoggingSettings, log_dir: PathBuf) -> Result<()> {
    let log_level = settings.level.to_lowercase();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log_level))
        .map_err(|e| BridgeError::ConfigError(format!("Invalid log level '{log_level}': {e}")))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false);

    let registry = Registry::default().with(filter).with(stderr_layer);

    if settings.file_enabled {
        std::fs::create_dir_all(&log_dir).map_err(|e| {
            BridgeError::ConfigError(format!("Failed to create log directory: {e}"))
        })?;

        let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
        let file_layer = fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        registry.with(file_layer).init();
        info!("Log file: {}", log_dir.join(LOG_FILE_NAME).display());
    } else {
        registry.init();
    }

    debug!("Bridge logging initialized with level: {}", log_level);
    Ok(())
}

/// Log a structured lifecycle event
pub fn log_bridge_event(event: &str, details: &str) {
    info!(target: "bridge", event = event, details = details);
}

/// Log one line of the backing server's diagnostic output
pub fn log_server_output(line: &str) {
    info!(target: "server", "[Serena] {}", line);
}
