use anyhow::Result;
use chrono::Local;
use std::io;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;

/// Get the appropriate log level based on verbosity
pub fn get_log_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Level used for a run.
///
/// The interactive view owns the terminal, so only errors get through unless
/// development mode sends everything to a file.
pub fn effective_level(verbosity: u8, ui: bool, dev: bool) -> Level {
    if ui && !dev {
        Level::ERROR
    } else {
        get_log_level(verbosity)
    }
}

/// File name for development mode logs
pub fn dev_log_file_name() -> String {
    format!("clustertop_dev_{}.log", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Install the global subscriber.
///
/// In development mode logs go to a file in the working directory. The
/// returned guard flushes that file and must live until the process exits.
pub fn init_logging(verbosity: u8, ui: bool, dev: bool) -> Result<Option<WorkerGuard>> {
    let log_level = effective_level(verbosity, ui, dev);

    if dev {
        let log_file_path = dev_log_file_name();
        eprintln!("🔍 Development mode enabled. Logs will be written to: {}", log_file_path);

        let file_appender = tracing_appender::rolling::never(".", &log_file_path);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_ansi(false)
            .with_writer(non_blocking)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
        return Ok(Some(guard));
    }

    // Stdout carries snapshots in headless mode
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    Ok(None)
}

/// Cancel `cancel` on Ctrl-C so the poller and the view shut down in order
pub fn setup_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            result = signal::ctrl_c() => {
                if result.is_ok() {
                    info!("Interrupt received, shutting down");
                    cancel.cancel();
                }
            }
            _ = cancel.cancelled() => {}
        }
    });
}
