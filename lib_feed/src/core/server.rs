//! # Feed Server
//!
//! Accepts WebSocket connections on a single logical endpoint and runs one independent
//! `SessionHandler` per client.
//!
//! ## Responsibilities:
//! - **Accept loop**: Axum serves every path; any request that is not `/health` is
//!   upgraded to a feed session.
//! - **Isolation**: each session runs in its own task with its own adapter. A failing or
//!   panicking session is logged and never reaches the accept loop or other sessions.
//! - **Shutdown**: on Ctrl-C or SIGTERM the server stops accepting and cancels every
//!   session; each one notices at its next suspension point and sends a close frame.
//!   `run_until` returns only after the sessions have drained, or after a grace period
//!   of twice the write timeout.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ws::WebSocket, ConnectInfo, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::configs::FeedConfig;
use crate::core::session::{SessionHandler, SessionSettings};
use crate::errors::FeedResult;
use crate::ingestors::AdapterFactory;

/// Shared, read-only state handed to every connection.
struct ServerState<F> {
    factory: F,
    settings: SessionSettings,
    shutdown: CancellationToken,
    sessions: TaskTracker,
}

pub struct FeedServer<F> {
    listener: TcpListener,
    state: Arc<ServerState<F>>,
}

impl<F: AdapterFactory> FeedServer<F> {
    /// Binds the configured address. Sessions built by `factory` use the configured cadence.
    pub async fn bind(config: &FeedConfig, factory: F) -> FeedResult<Self> {
        let listener = TcpListener::bind((config.bind_address.as_str(), config.bind_port)).await?;
        let settings = SessionSettings {
            cadence: config.cadence(),
            write_timeout: config.write_timeout,
        };
        Ok(Self::from_listener(listener, factory, settings))
    }

    pub fn from_listener(listener: TcpListener, factory: F, settings: SessionSettings) -> Self {
        Self {
            listener,
            state: Arc::new(ServerState {
                factory,
                settings,
                shutdown: CancellationToken::new(),
                sessions: TaskTracker::new(),
            }),
        }
    }

    /// The bound address, useful when binding port `0`.
    pub fn local_addr(&self) -> FeedResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// A handle that stops the server and all of its sessions when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// Serves until a Ctrl-C or SIGTERM arrives.
    pub async fn run(self) -> FeedResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serves until `shutdown` resolves or the shutdown token is cancelled.
    pub async fn run_until<S>(self, shutdown: S) -> FeedResult<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let token = self.state.shutdown.clone();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown => {
                    warn!("Shutdown signal received. Closing sessions...");
                    trigger.cancel();
                }
                _ = trigger.cancelled() => {}
            }
        });

        let sessions = self.state.sessions.clone();
        let grace = self.state.settings.write_timeout * 2;
        let app = Router::new()
            .route("/health", get(health_handler))
            .fallback(ws_handler::<F>)
            .with_state(self.state);

        info!("Feed server listening on ws://{}", self.listener.local_addr()?);
        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

        info!("Feed server stopped accepting connections.");

        // Upgraded sockets are not covered by the graceful shutdown above.
        sessions.close();
        if timeout(grace, sessions.wait()).await.is_err() {
            warn!("{} sessions still running after {:?}, abandoning them", sessions.len(), grace);
        } else {
            info!("All sessions drained.");
        }
        Ok(())
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn ws_handler<F: AdapterFactory>(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<ServerState<F>>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

async fn handle_socket<F: AdapterFactory>(
    socket: WebSocket,
    state: Arc<ServerState<F>>,
    addr: SocketAddr,
) {
    info!("Client connected: {}", addr);
    let adapter = state.factory.create();
    let settings = state.settings;
    let shutdown = state.shutdown.child_token();

    let session = state.sessions.spawn(async move {
        let (writer, reader) = socket.split();
        let mut handler = SessionHandler::new(adapter, settings, addr);
        // Outcome is logged by the handler itself.
        let _ = handler.run(writer, reader, shutdown).await;
    });

    if let Err(e) = session.await {
        if e.is_panic() {
            error!("Session {} panicked: {}", addr, e);
        } else {
            error!("Session {} aborted: {}", addr, e);
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

