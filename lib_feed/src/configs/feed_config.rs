use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{FeedError, FeedResult};

/// Which source the server pushes from. Selects defaults and the session cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Synthetic,
    Polling,
}

impl FeedKind {
    pub fn app_name(self) -> &'static str {
        match self {
            FeedKind::Synthetic => "server_synthetic",
            FeedKind::Polling => "server_polling",
        }
    }
}

/// Raw settings from one layer (file, environment, CLI). `None` means "not set here".
#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Real-time series feed WebSocket server", version)]
#[serde(rename_all = "camelCase")]
pub struct FeedArgs {
    #[clap(long = "resource", env = "FEED_RESOURCE", help = "File to watch (polling server only).")]
    pub resource_locator: Option<PathBuf>,

    #[clap(long = "host", env = "FEED_HOST", help = "Address to bind for client connections.")]
    pub bind_address: Option<String>,

    #[clap(long = "port", env = "FEED_PORT", help = "Port to listen on for client connections.")]
    pub bind_port: Option<u16>,

    #[clap(long, env = "FEED_POLL_INTERVAL_MS", help = "Milliseconds between checks of the watched file.")]
    pub poll_interval_ms: Option<u64>,

    #[clap(long, env = "FEED_PUSH_INTERVAL_MS", help = "Milliseconds between synthetic pushes.")]
    pub push_interval_ms: Option<u64>,

    #[clap(long, env = "FEED_MAX_POINTS", help = "Maximum points kept per series.")]
    pub max_points: Option<usize>,

    #[clap(long, env = "FEED_WRITE_TIMEOUT_MS", help = "Milliseconds before a stalled write drops the client.")]
    pub write_timeout_ms: Option<u64>,

    #[clap(long, env = "FEED_LOG_DIR", help = "Directory for log files. Console only when unset.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "FEED_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error, fatal).")]
    pub log_level: Option<String>,

    #[clap(long, env = "FEED_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,
}

impl FeedArgs {
    // 'other' overrides 'self' for Some values
    pub fn merge(self, other: FeedArgs) -> FeedArgs {
        FeedArgs {
            resource_locator: other.resource_locator.or(self.resource_locator),
            bind_address: other.bind_address.or(self.bind_address),
            bind_port: other.bind_port.or(self.bind_port),
            poll_interval_ms: other.poll_interval_ms.or(self.poll_interval_ms),
            push_interval_ms: other.push_interval_ms.or(self.push_interval_ms),
            max_points: other.max_points.or(self.max_points),
            write_timeout_ms: other.write_timeout_ms.or(self.write_timeout_ms),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            config_path: other.config_path.or(self.config_path),
        }
    }

    /// Built-in defaults for `kind`.
    pub fn defaults(kind: FeedKind) -> FeedArgs {
        FeedArgs {
            bind_address: Some("localhost".to_string()),
            bind_port: Some(match kind {
                FeedKind::Synthetic => 8004,
                FeedKind::Polling => 8005,
            }),
            poll_interval_ms: Some(500),
            push_interval_ms: Some(100),
            max_points: Some(1000),
            write_timeout_ms: Some(5000),
            log_level: Some("info".to_string()),
            ..Default::default()
        }
    }
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub kind: FeedKind,
    pub resource_locator: Option<PathBuf>,
    pub bind_address: String,
    pub bind_port: u16,
    pub poll_interval: Duration,
    pub push_interval: Duration,
    pub max_points: usize,
    pub write_timeout: Duration,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
    /// Things noticed while loading, held until logging is up.
    pub notices: Vec<ConfigNotice>,
}

/// Something worth reporting about how the configuration was assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigNotice {
    FileMissing(PathBuf),
    FileRejected { path: PathBuf, reason: String },
}

impl fmt::Display for ConfigNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigNotice::FileMissing(path) => write!(
                f,
                "Config file not found at {}. Using defaults and environment/CLI variables.",
                path.display()
            ),
            ConfigNotice::FileRejected { path, reason } => write!(
                f,
                "Failed to load config file {}: {}. Falling back to other sources.",
                path.display(),
                reason
            ),
        }
    }
}

impl FeedConfig {
    /// Resolves `args` on top of the defaults for `kind` and validates the result.
    pub fn resolve(kind: FeedKind, args: FeedArgs) -> FeedResult<Self> {
        let merged = FeedArgs::defaults(kind).merge(args);
        let missing = |name: &str| FeedError::Config(format!("{} has no value", name));

        let config = FeedConfig {
            kind,
            resource_locator: merged.resource_locator,
            bind_address: merged.bind_address.ok_or_else(|| missing("bind_address"))?,
            bind_port: merged.bind_port.ok_or_else(|| missing("bind_port"))?,
            poll_interval: Duration::from_millis(merged.poll_interval_ms.ok_or_else(|| missing("poll_interval_ms"))?),
            push_interval: Duration::from_millis(merged.push_interval_ms.ok_or_else(|| missing("push_interval_ms"))?),
            max_points: merged.max_points.ok_or_else(|| missing("max_points"))?,
            write_timeout: Duration::from_millis(merged.write_timeout_ms.ok_or_else(|| missing("write_timeout_ms"))?),
            log_dir: merged.log_dir,
            log_level: merged.log_level.ok_or_else(|| missing("log_level"))?,
            notices: Vec::new(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FeedResult<()> {
        if self.max_points == 0 {
            return Err(FeedError::Config("max_points must be greater than zero".to_string()));
        }
        if self.poll_interval.is_zero() || self.push_interval.is_zero() {
            return Err(FeedError::Config("intervals must be greater than zero".to_string()));
        }
        if self.write_timeout.is_zero() {
            return Err(FeedError::Config("write_timeout_ms must be greater than zero".to_string()));
        }
        if self.kind == FeedKind::Polling && self.resource_locator.is_none() {
            return Err(FeedError::Config(
                "the polling server needs a resource to watch (--resource or FEED_RESOURCE)".to_string(),
            ));
        }
        Ok(())
    }

    /// Interval between adapter invocations for this kind of server.
    pub fn cadence(&self) -> Duration {
        match self.kind {
            FeedKind::Synthetic => self.push_interval,
            FeedKind::Polling => self.poll_interval,
        }
    }

    /// Emits the loading notices. Call once the subscriber is installed.
    pub fn log_notices(&self) {
        for notice in &self.notices {
            match notice {
                ConfigNotice::FileMissing(_) => info!("{}", notice),
                ConfigNotice::FileRejected { .. } => warn!("{}", notice),
            }
        }
    }
}

/// Reads a JSON config file layer. A missing or malformed file is not an error; it comes
/// back as a notice and the layer is skipped.
pub fn read_config_file(path: &Path) -> Result<FeedArgs, ConfigNotice> {
    if !path.exists() {
        return Err(ConfigNotice::FileMissing(path.to_path_buf()));
    }
    let rejected = |reason: String| ConfigNotice::FileRejected {
        path: path.to_path_buf(),
        reason,
    };
    let text = fs::read_to_string(path).map_err(|e| rejected(e.to_string()))?;
    serde_json::from_str::<FeedArgs>(&text).map_err(|e| rejected(e.to_string()))
}

/// Layers the config file (if any) under `cli` and resolves.
pub fn load_config_from(kind: FeedKind, cli: FeedArgs) -> FeedResult<FeedConfig> {
    let config_file = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.conf", kind.app_name())));

    let mut notices = Vec::new();
    let layered = match read_config_file(&config_file) {
        Ok(file_args) => file_args.merge(cli),
        Err(notice) => {
            notices.push(notice);
            cli
        }
    };
    let mut config = FeedConfig::resolve(kind, layered)?;
    config.notices = notices;
    Ok(config)
}

/// Loads `.env`, parses environment and command line, and resolves the configuration.
pub fn load_config(kind: FeedKind) -> FeedResult<FeedConfig> {
    let _ = dotenvy::dotenv();
    load_config_from(kind, FeedArgs::parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_per_kind() {
        let synthetic = FeedConfig::resolve(FeedKind::Synthetic, FeedArgs::default()).unwrap();
        assert_eq!(synthetic.bind_address, "localhost");
        assert_eq!(synthetic.bind_port, 8004);
        assert_eq!(synthetic.cadence(), Duration::from_millis(100));
        assert_eq!(synthetic.max_points, 1000);

        let polling = FeedConfig::resolve(
            FeedKind::Polling,
            FeedArgs {
                resource_locator: Some(PathBuf::from("data/cpu.csv")),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(polling.bind_port, 8005);
        assert_eq!(polling.cadence(), Duration::from_millis(500));
    }

    #[test]
    fn polling_requires_a_resource() {
        let err = FeedConfig::resolve(FeedKind::Polling, FeedArgs::default()).unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let args = FeedArgs {
            max_points: Some(0),
            ..Default::default()
        };
        assert!(FeedConfig::resolve(FeedKind::Synthetic, args).is_err());
    }

    #[test]
    fn later_layers_win() {
        let file = FeedArgs {
            bind_port: Some(9000),
            max_points: Some(50),
            ..Default::default()
        };
        let cli = FeedArgs {
            bind_port: Some(9001),
            ..Default::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.bind_port, Some(9001));
        assert_eq!(merged.max_points, Some(50));
    }

    #[test]
    fn config_file_sits_under_cli_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.conf");
        fs::write(
            &path,
            r#"{ "bindPort": 7000, "maxPoints": 20, "resourceLocator": "/tmp/load.csv" }"#,
        )
        .unwrap();

        let cli = FeedArgs {
            bind_port: Some(7001),
            config_path: Some(path),
            ..Default::default()
        };
        let config = load_config_from(FeedKind::Polling, cli).unwrap();
        assert_eq!(config.bind_port, 7001);
        assert_eq!(config.max_points, 20);
        assert_eq!(config.resource_locator, Some(PathBuf::from("/tmp/load.csv")));
        assert!(config.notices.is_empty());
    }

    #[test]
    fn malformed_config_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.conf");
        fs::write(&path, "{ not json").unwrap();

        let cli = FeedArgs {
            config_path: Some(path.clone()),
            ..Default::default()
        };
        let config = load_config_from(FeedKind::Synthetic, cli).unwrap();
        assert_eq!(config.bind_port, 8004);
        assert!(matches!(
            config.notices.as_slice(),
            [ConfigNotice::FileRejected { path: rejected, .. }] if *rejected == path
        ));
    }

    #[test]
    fn missing_config_file_is_noted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.conf");
        let cli = FeedArgs {
            config_path: Some(path.clone()),
            ..Default::default()
        };
        let config = load_config_from(FeedKind::Synthetic, cli).unwrap();
        assert_eq!(config.notices, vec![ConfigNotice::FileMissing(path)]);
        assert!(config.notices[0].to_string().contains("absent.conf"));
    }
}
