use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Target of the per-answer audit events emitted by the mastery service.
pub const AUDIT_TARGET: &str = "mastery::audit";

pub struct FileLogGuard {
    _app: WorkerGuard,
    _audit: WorkerGuard,
}

pub fn file_logging_enabled() -> bool {
    std::env::var("ENABLE_FILE_LOGS")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// whole process, dropping it stops the file writers.
///
/// With `ENABLE_FILE_LOGS` the audit trail additionally goes to its own
/// daily `audit.log`, independent of `RUST_LOG`.
pub fn init_tracing(log_level: &str) -> Option<FileLogGuard> {
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(true).with_filter(env_filter);

    if file_logging_enabled() {
        let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
        if let Err(err) = std::fs::create_dir_all(&log_dir) {
            eprintln!("failed to create log directory {log_dir}: {err}");
        } else {
            let app_filter =
                EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
            let app_appender =
                RollingFileAppender::new(Rotation::DAILY, &log_dir, "mastery-backend.log");
            let (app_writer, app_guard) = tracing_appender::non_blocking(app_appender);
            let app_layer = fmt::layer()
                .with_writer(app_writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(app_filter);

            let audit_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "audit.log");
            let (audit_writer, audit_guard) = tracing_appender::non_blocking(audit_appender);
            let audit_layer = fmt::layer()
                .with_writer(audit_writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(Targets::new().with_target(AUDIT_TARGET, Level::INFO));

            tracing_subscriber::registry()
                .with(stdout_layer)
                .with(app_layer)
                .with(audit_layer)
                .init();

            return Some(FileLogGuard {
                _app: app_guard,
                _audit: audit_guard,
            });
        }
    }

    tracing_subscriber::registry().with(stdout_layer).init();

    None
}
