use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::errors::{FeedError, FeedResult};

/// Maps a configured level name to an `EnvFilter` directive. Unknown names fall back to `info`.
pub fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "fatal" => "error",
        _ => "info",
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over `log_level`. When `log_dir` is set, a daily rolling
/// `<app_name>.log` file is written next to the console output; keep the returned guard
/// alive for as long as logs should be flushed.
pub fn setup_logging(
    app_name: &str,
    log_dir: Option<&Path>,
    log_level: &str,
) -> FeedResult<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(normalize_level(log_level)));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, format!("{}.log", app_name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| FeedError::Logging(e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(normalize_level("DEBUG"), "debug");
        assert_eq!(normalize_level("fatal"), "error");
        assert_eq!(normalize_level(" warning "), "warn");
        assert_eq!(normalize_level("chatty"), "info");
    }
}
