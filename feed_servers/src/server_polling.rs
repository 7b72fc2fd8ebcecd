//! # File Polling Feed Server
//!
//! Watches one file of `timestamp,value` rows and pushes it to every connected WebSocket
//! client as a single series named after the file stem, but only when the parsed content
//! actually changes. A missing file is waited for indefinitely.
//!
//! Default endpoint: `ws://localhost:8005`.

use anyhow::{Context, Result};
use tracing::info;

use lib_feed::configs::{load_config, FeedKind};
use lib_feed::loggers::setup_logging;
use lib_feed::{FeedServer, FilePollingAdapter, PolledResource};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config(FeedKind::Polling)?;
    let _log_guard = setup_logging(
        FeedKind::Polling.app_name(),
        config.log_dir.as_deref(),
        &config.log_level,
    )?;
    config.log_notices();

    let locator = config
        .resource_locator
        .clone()
        .context("no resource configured")?;
    let resource = PolledResource::new(locator)?;
    if !resource.path().exists() {
        info!("{} does not exist yet, waiting for it to appear", resource.path().display());
    }

    let max_points = config.max_points;
    let watched = resource.clone();
    let server = FeedServer::bind(&config, move || {
        FilePollingAdapter::new(watched.clone(), max_points)
    })
    .await?;
    info!(
        "Polling feed on ws://{} watching {} as '{}' (every {:?})",
        server.local_addr()?,
        resource.path().display(),
        resource.measurement(),
        config.poll_interval
    );

    server.run().await?;
    info!("Server stopped");
    Ok(())
}
