//! Helpers for driving the feed servers end to end over real sockets.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use lib_feed::core::SessionSettings;
use lib_feed::{AdapterFactory, FeedResult, FeedServer};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A feed server bound to an ephemeral loopback port.
pub struct RunningServer {
    pub addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<FeedResult<()>>,
}

impl RunningServer {
    pub fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    /// Signals shutdown without waiting for the server to exit.
    pub fn trigger_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub async fn stop(self) -> Result<()> {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .context("server did not stop in time")???;
        Ok(())
    }
}

pub async fn start<F: AdapterFactory>(factory: F, cadence: Duration) -> Result<RunningServer> {
    let settings = SessionSettings {
        cadence,
        write_timeout: Duration::from_secs(2),
    };
    start_with(factory, settings).await
}

pub async fn start_with<F: AdapterFactory>(factory: F, settings: SessionSettings) -> Result<RunningServer> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let server = FeedServer::from_listener(listener, factory, settings);
    let addr = server.local_addr()?;
    let shutdown = server.shutdown_token();
    let handle = tokio::spawn(server.run_until(std::future::pending::<()>()));

    Ok(RunningServer {
        addr,
        shutdown,
        handle,
    })
}

pub async fn connect(url: &str) -> Result<Client> {
    let (client, _) = connect_async(url).await?;
    Ok(client)
}

/// Next data frame parsed as JSON, or `None` once `deadline` passes first.
pub async fn next_frame_until(client: &mut Client, deadline: Instant) -> Result<Option<Value>> {
    loop {
        let message = match timeout_at(deadline, client.next()).await {
            Err(_) => return Ok(None),
            Ok(None) => bail!("stream ended"),
            Ok(Some(message)) => message?,
        };
        match message {
            Message::Text(text) => return Ok(Some(serde_json::from_str(text.as_str())?)),
            Message::Close(_) => bail!("server closed the connection"),
            _ => continue,
        }
    }
}

pub async fn next_frame(client: &mut Client, wait: Duration) -> Result<Option<Value>> {
    next_frame_until(client, Instant::now() + wait).await
}

/// Drains data frames until the server's close frame arrives.
pub async fn expect_close(client: &mut Client, wait: Duration) -> Result<()> {
    let deadline = Instant::now() + wait;
    loop {
        match timeout_at(deadline, client.next()).await {
            Err(_) => bail!("no close frame within {:?}", wait),
            Ok(None) => bail!("stream ended without a close frame"),
            Ok(Some(message)) => {
                if let Message::Close(_) = message? {
                    return Ok(());
                }
            }
        }
    }
}

/// Waits for the connection to end by any means: close frame, end of stream or a
/// transport error from an abruptly dropped socket.
pub async fn expect_disconnect(client: &mut Client, wait: Duration) -> Result<()> {
    let deadline = Instant::now() + wait;
    loop {
        match timeout_at(deadline, client.next()).await {
            Err(_) => bail!("connection still open after {:?}", wait),
            Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return Ok(()),
            Ok(Some(Ok(_))) => continue,
        }
    }
}

/// Per-series point counts of one frame, in key order.
pub fn points_per_series(frame: &Value) -> Result<Vec<(String, usize)>> {
    let object = frame.as_object().context("frame is not an object")?;
    let mut counts = Vec::with_capacity(object.len());
    for (name, points) in object {
        let points = points.as_array().context("series is not an array")?;
        for point in points {
            let pair = point.as_array().context("point is not an array")?;
            if pair.len() != 2 || !pair[0].is_i64() || !pair[1].is_number() {
                bail!("malformed point {} in series {}", point, name);
            }
        }
        counts.push((name.clone(), points.len()));
    }
    Ok(counts)
}
