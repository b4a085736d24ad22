use std::path::Path;
use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_filter(base_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(base_level))
        .unwrap_or_else(|e| panic!("Invalid log filter: {}", e))
}

/// Console-only logging, stderr for warnings and up.
pub fn setup_console_logging(base_level: &str) {
    let console_writer = std::io::stdout.and(std::io::stderr.with_min_level(Level::WARN));

    tracing_subscriber::registry()
        .with(env_filter(base_level))
        .with(tracing_subscriber::fmt::layer().with_writer(console_writer))
        .try_init()
        .unwrap_or_else(|e| panic!("Logger initialization failed: {}", e));
}

/// Console logging plus a daily-rolling log file under `log_dir`.
pub fn setup_logging(base_level: &str, log_dir: &Path) {
    std::fs::create_dir_all(log_dir)
        .unwrap_or_else(|e| panic!("Failed to create log directory: {}", e));

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("submit")
        .filename_suffix("log")
        .max_log_files(5)
        .build(log_dir)
        .unwrap_or_else(|e| panic!("Failed to create log file appender: {}", e));

    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    LOG_GUARD.set(guard).expect("Logging already initialized");

    let console_writer = std::io::stdout.and(std::io::stderr.with_min_level(Level::WARN));

    tracing_subscriber::registry()
        .with(env_filter(base_level))
        .with(tracing_subscriber::fmt::layer().with_writer(console_writer))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()
        .unwrap_or_else(|e| panic!("Logger initialization failed: {}", e));
}
