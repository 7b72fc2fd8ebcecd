//! # Synthetic Feed Server
//!
//! Pushes simulated `cpu`, `memory` and `disk` series to every connected WebSocket
//! client, one frame per push interval (100 ms by default) carrying up to `max_points`
//! points per series. Each client gets its own generator and buffers.
//!
//! Default endpoint: `ws://localhost:8004`.

use anyhow::Result;
use tracing::info;

use lib_feed::configs::{load_config, FeedKind};
use lib_feed::loggers::setup_logging;
use lib_feed::{FeedServer, SyntheticAdapter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config(FeedKind::Synthetic)?;
    let _log_guard = setup_logging(
        FeedKind::Synthetic.app_name(),
        config.log_dir.as_deref(),
        &config.log_level,
    )?;
    config.log_notices();

    let max_points = config.max_points;
    let server = FeedServer::bind(&config, move || SyntheticAdapter::new(max_points)).await?;
    info!(
        "Synthetic feed on ws://{} (push every {:?}, {} points per series)",
        server.local_addr()?,
        config.push_interval,
        max_points
    );

    server.run().await?;
    info!("Server stopped");
    Ok(())
}
