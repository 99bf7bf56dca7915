//! TCP server (spec §4.8): accepts connections, performs the Connect
//! handshake, and runs the per-connection decode/dispatch/encode/write
//! loop until the peer closes or a transport error occurs.
//!
//! Grounded on `original_source/src/luxdb/server.py::Server`/`serve` (the
//! `asyncio.start_server` + per-signal `shutdown()` design) translated to
//! `tokio::net::TcpListener`, matching the teacher's own
//! `tokio::signal::ctrl_c` shutdown hook in its `main.rs`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::codec::{self, Command, CommandResult};
use crate::crypto::Token;
use crate::dispatch::dispatch;
use crate::error::TransportError;
use crate::frame;
use crate::store::Store;

/// `Created → Listening → Draining → Closed`: only `Listening → Draining`
/// is reachable from a signal; the accept loop exits when the listening
/// socket is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Listening,
    Draining,
    Closed,
}

pub struct Server {
    host: String,
    port: Option<u16>,
    store: Arc<Store>,
    token: Token,
    draining: Arc<AtomicBool>,
}

impl Server {
    pub fn new(host: impl Into<String>, port: Option<u16>, store: Store, token: Token) -> Self {
        Self {
            host: host.into(),
            port,
            store: Arc::new(store),
            token,
            draining: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current point in the `Created → Listening → Draining → Closed`
    /// state machine. `Closed` is only observable after `serve` returns.
    pub fn state(&self) -> ServerState {
        if self.draining.load(Ordering::SeqCst) {
            ServerState::Draining
        } else {
            ServerState::Listening
        }
    }

    /// Binds the listening socket and returns the address actually bound
    /// (relevant when `port` is `None` and the OS picks one).
    pub async fn bind(&self) -> std::io::Result<(TcpListener, SocketAddr)> {
        let addr = format!("{}:{}", self.host, self.port.unwrap_or(0));
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        Ok((listener, local_addr))
    }

    /// Runs the accept loop until a shutdown signal is received, then
    /// drains in-flight connections and closes the store. Returns once
    /// the server has reached `Closed`.
    pub async fn serve(&self, listener: TcpListener) {
        info!(addr = %listener.local_addr().map(|a| a.to_string()).unwrap_or_default(), "serving");

        let mut tasks = JoinSet::new();
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "new connection");
                            let store = self.store.clone();
                            let token = self.token.clone();
                            tasks.spawn(async move {
                                if let Err(e) = handle_connection(stream, store, token).await {
                                    warn!(%peer, error = %e, "connection terminated");
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "accept failed"),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("SIGINT received, shutting down");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("SIGTERM received, shutting down");
                    break;
                }
            }
        }

        self.draining.store(true, Ordering::SeqCst);
        drop(listener);

        info!(pending = tasks.len(), "draining in-flight connections");
        while tasks.join_next().await.is_some() {}

        if let Err(e) = self.store.close() {
            error!(error = %e, "error closing store");
        }
        info!("shutdown complete");
    }
}

/// Per-connection lifecycle (spec §4.8 steps 2-4): first frame is the
/// handshake attempt, then a decode/dispatch/encode/write loop until the
/// peer sends the close sentinel or the transport errors out.
async fn handle_connection(stream: TcpStream, store: Arc<Store>, token: Token) -> Result<(), TransportError> {
    let (mut reader, mut writer) = stream.into_split();

    let Some(payload) = frame::recv_frame(&mut reader).await? else {
        return Ok(());
    };

    let command: Command = match codec::decode(&payload, &token) {
        Ok(cmd) => cmd,
        Err(TransportError::InvalidToken) => {
            debug!("invalid token on first frame, closing silently");
            let _ = frame::send_close(&mut writer).await;
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let result = dispatch(command, &store).await;
    send_result(&mut writer, &result, &token).await?;

    loop {
        let Some(payload) = frame::recv_frame(&mut reader).await? else {
            break;
        };

        let command: Command = match codec::decode(&payload, &token) {
            Ok(cmd) => cmd,
            Err(TransportError::InvalidToken) => {
                debug!("invalid token mid-connection, closing silently");
                let _ = frame::send_close(&mut writer).await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let result = dispatch(command, &store).await;
        send_result(&mut writer, &result, &token).await?;
    }

    Ok(())
}

async fn send_result<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    result: &CommandResult,
    token: &Token,
) -> Result<(), TransportError> {
    let wire = codec::encode(result, token)?;
    frame::send_frame(writer, &wire).await
}
