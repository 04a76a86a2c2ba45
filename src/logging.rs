//! `tracing` setup for the CLI
//!
//! Events go to stderr so that stdout stays reserved for the session summary.
//! When a log file is configured every event is also written there, without
//! ANSI colors, through a non-blocking writer.

use crate::config::{LogRotation, LoggingOptions};
use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::OnceLock;
use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// HTTP client internals are noisy at `debug`; keep them at `warn` unless the
/// level string names them explicitly.
const QUIET_DEPENDENCIES: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls"];

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. A second call is a no-op.
pub fn init(options: &LoggingOptions) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let filter = env_filter(&options.level)?;
    let file_writer = match options.file.as_deref() {
        Some(path) => Some(file_writer(path, options.rotation)?),
        None => None,
    };

    Registry::default()
        .with(filter)
        .with(file_writer.map(|writer| file_layer(writer)))
        .with(stderr_layer(options.color))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
}

fn env_filter(level: &str) -> Result<EnvFilter> {
    let mut directives = level.trim().to_string();
    for target in QUIET_DEPENDENCIES {
        if !directives.contains(target) {
            directives.push_str(&format!(",{target}=warn"));
        }
    }
    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("Invalid log level '{level}': {e}")))
}

fn file_writer(path: &Path, rotation: Option<LogRotation>) -> Result<NonBlocking> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| {
        Error::Config(format!(
            "Failed to create log directory {}: {e}",
            dir.display()
        ))
    })?;

    let builder = NonBlockingBuilder::default().lossy(false);
    let (writer, guard) = match rotation {
        Some(rotation) => {
            let file_name = path.file_name().ok_or_else(|| {
                Error::Config(format!(
                    "Log file '{}' needs a file name to rotate",
                    path.display()
                ))
            })?;
            let appender = match rotation {
                LogRotation::Hourly => rolling::hourly(dir, file_name),
                LogRotation::Daily => rolling::daily(dir, file_name),
            };
            builder.finish(appender)
        }
        None => {
            let file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)
                .map_err(|e| {
                    Error::Config(format!("Failed to open log file {}: {e}", path.display()))
                })?;
            builder.finish(file)
        }
    };

    // Dropping the guard would stop the writer thread.
    let _ = FILE_GUARD.set(guard);
    Ok(writer)
}

fn file_layer<S>(writer: NonBlocking) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_ansi(false)
        .with_writer(writer)
}

fn stderr_layer<S>(color: bool) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_ansi(color)
        .with_writer(io::stderr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiets_http_internals_by_default() {
        let filter = env_filter("debug").unwrap().to_string();
        assert!(filter.contains("reqwest=warn"));
        assert!(filter.contains("hyper=warn"));
    }

    #[test]
    fn explicit_dependency_levels_are_kept() {
        let filter = env_filter("info,reqwest=trace").unwrap().to_string();
        assert!(filter.contains("reqwest=trace"));
        assert!(!filter.contains("reqwest=warn"));
    }

    #[test]
    fn garbage_level_is_a_config_error() {
        assert!(matches!(env_filter("info,qrstudio=loud"), Err(Error::Config(_))));
    }

    #[test]
    fn rotation_requires_a_file_name() {
        let result = file_writer(Path::new("/"), Some(LogRotation::Daily));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
