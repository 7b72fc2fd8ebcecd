//! # Push Session
//!
//! One `SessionHandler` runs per WebSocket connection. It owns its source adapter and a
//! cadence, and pushes full snapshots to a single client until the connection goes away.
//!
//! ## Lifecycle:
//! `Connected → Active → Disconnecting → Closed`
//!
//! - **Active**: on every cadence tick (the first one fires immediately) the adapter is
//!   asked for new data, which is serialized and written under a bounded write timeout.
//!   Inbound frames are drained and ignored; they are only read to notice a close.
//! - **Disconnecting**: entered on client close, transport failure, write timeout, adapter
//!   failure or server shutdown. On shutdown a close frame is sent to the client.
//! - **Closed**: the task returns and the adapter with its buffers is dropped.
//!
//! The server shutdown token is checked at every suspension point.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::series_buffer::Snapshot;
use crate::errors::{FeedError, FeedResult};
use crate::ingestors::SourceAdapter;

/// Every this many pushes the session logs a progress line.
pub const PROGRESS_EVERY: u64 = 100;

/// Timing knobs shared by all sessions of a server.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Interval between adapter invocations.
    pub cadence: Duration,
    /// Upper bound on a single frame write.
    pub write_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Active,
    Disconnecting,
    Closed,
}

pub struct SessionHandler<A> {
    adapter: A,
    settings: SessionSettings,
    peer: SocketAddr,
    state: SessionState,
    pushes: u64,
}

impl<A: SourceAdapter> SessionHandler<A> {
    pub fn new(adapter: A, settings: SessionSettings, peer: SocketAddr) -> Self {
        Self {
            adapter,
            settings,
            peer,
            state: SessionState::Connected,
            pushes: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of frames written so far.
    pub fn pushes(&self) -> u64 {
        self.pushes
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {}: {:?} -> {:?}", self.peer, self.state, next);
        self.state = next;
    }

    /// Drives the session to completion over the two halves of a WebSocket.
    ///
    /// Returns `Ok(())` when the server shut the session down, otherwise the error that
    /// ended it. Either way the outcome has already been logged.
    pub async fn run<W, R>(
        &mut self,
        mut writer: W,
        mut reader: R,
        shutdown: CancellationToken,
    ) -> FeedResult<()>
    where
        W: Sink<Message, Error = axum::Error> + Unpin + Send,
        R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
    {
        self.transition(SessionState::Active);
        let outcome = self.active_loop(&mut writer, &mut reader, &shutdown).await;
        self.transition(SessionState::Disconnecting);

        match &outcome {
            Ok(()) => {
                info!("Session {} closed by server shutdown after {} updates", self.peer, self.pushes);
                let goodbye = Message::Close(Some(CloseFrame {
                    code: close_code::AWAY,
                    reason: Utf8Bytes::from_static("server shutting down"),
                }));
                let _ = timeout(self.settings.write_timeout, writer.send(goodbye)).await;
            }
            Err(e) if e.is_expected_disconnect() => {
                info!("Client disconnected: {} after {} updates", self.peer, self.pushes);
            }
            Err(e @ (FeedError::Transport(_) | FeedError::WriteTimeout(_))) => {
                warn!("Session {} dropped: {}", self.peer, e);
            }
            Err(e) => {
                error!("Session {} failed: {}", self.peer, e);
            }
        }

        self.transition(SessionState::Closed);
        outcome
    }

    async fn active_loop<W, R>(
        &mut self,
        writer: &mut W,
        reader: &mut R,
        shutdown: &CancellationToken,
    ) -> FeedResult<()>
    where
        W: Sink<Message, Error = axum::Error> + Unpin + Send,
        R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
    {
        let mut ticker = interval(self.settings.cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => return Ok(()),

                inbound = reader.next() => match inbound {
                    None | Some(Ok(Message::Close(_))) => return Err(FeedError::ConnectionClosed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(FeedError::from_transport(e)),
                },

                _ = ticker.tick() => {
                    let step = self.step(writer);
                    let finished = tokio::select! {
                        _ = shutdown.cancelled() => None,
                        result = step => Some(result),
                    };
                    match finished {
                        Some(result) => result?,
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    /// One cadence tick: ask the adapter, push if it has something new.
    async fn step<W>(&mut self, writer: &mut W) -> FeedResult<()>
    where
        W: Sink<Message, Error = axum::Error> + Unpin + Send,
    {
        if let Some(snapshot) = self.adapter.produce_snapshot().await? {
            self.push(writer, &snapshot).await?;
        }
        Ok(())
    }

    async fn push<W>(&mut self, writer: &mut W, snapshot: &Snapshot) -> FeedResult<()>
    where
        W: Sink<Message, Error = axum::Error> + Unpin + Send,
    {
        let frame = snapshot.to_frame()?;
        match timeout(self.settings.write_timeout, writer.send(Message::Text(frame.into()))).await {
            Err(_) => return Err(FeedError::WriteTimeout(self.settings.write_timeout)),
            Ok(Err(e)) => return Err(FeedError::from_transport(e)),
            Ok(Ok(())) => {}
        }

        self.pushes += 1;
        if self.pushes % PROGRESS_EVERY == 0 {
            info!(
                "Sent {} updates ({} points per series) to {}",
                self.pushes,
                snapshot.points_per_series(),
                self.peer
            );
        }
        Ok(())
    }
}
