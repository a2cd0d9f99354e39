use crate::utils::error::Result;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::subscriber::DefaultGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

/// Local wall-clock time with an explicit UTC offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTimestamp;

impl FormatTime for LocalTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f %:z")
        )
    }
}

/// Keeps the run's subscriber installed and the log file writer alive.
/// Dropping it flushes the file and uninstalls the subscriber.
pub struct LogGuard {
    _default: DefaultGuard,
    _writer: WorkerGuard,
}

fn filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("seo_batch=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("seo_batch=info"))
    }
}

pub fn init_cli_logger(verbose: bool, log_file: &Path, json: bool) -> Result<LogGuard> {
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;
    let (writer, writer_guard) = tracing_appender::non_blocking(file);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_timer(LocalTimestamp)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let file_layer = if json {
        tracing_subscriber::fmt::layer()
            .with_timer(LocalTimestamp)
            .with_writer(writer)
            .with_ansi(false)
            .json()
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_timer(LocalTimestamp)
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .boxed()
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter(verbose))
        .with(console_layer)
        .with(file_layer);

    let default_guard = tracing::subscriber::set_default(subscriber);

    Ok(LogGuard {
        _default: default_guard,
        _writer: writer_guard,
    })
}
