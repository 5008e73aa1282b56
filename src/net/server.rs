//! TCP serve loops.
//!
//! # Responsibilities
//! - Bind every configured port and accept connections until shutdown
//! - Apply per-port admission before any byte is read
//! - Run the optional TLS handshake
//! - Parse requests sequentially per connection and drive each exchange
//!   through the handler, consuming the handoff decision exhaustively

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;

use crate::config::setup::{Port, Setup};
use crate::http::request::{HttpRequest, ParsedHead};
use crate::http::response::http_reply;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::session::{HttpSession, Session, SessionEvent};
use crate::net::tls::{self, TlsError};
use crate::rpc::handoff::{Handoff, Transport};
use crate::rpc::pipeline::ServerHandler;

/// Upper bound on a request head; connections sending more are cut off.
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Error type for server startup.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        source: std::io::Error,
    },

    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// Front-end server: one accept loop per configured port.
pub struct Server {
    setup: Arc<Setup>,
    handler: Arc<ServerHandler>,
}

impl Server {
    pub fn new(setup: Arc<Setup>, handler: Arc<ServerHandler>) -> Self {
        Self { setup, handler }
    }

    /// Bind every port and serve until the shutdown signal fires.
    pub async fn run(self, shutdown: &Shutdown) -> Result<(), ServerError> {
        let mut loops = Vec::with_capacity(self.setup.ports.len());

        for port in &self.setup.ports {
            let acceptor = tls::build_acceptor(port)?;
            let address = port.bind_address();
            let listener =
                TcpListener::bind(address)
                    .await
                    .map_err(|source| ServerError::Bind { address, source })?;

            tracing::info!(
                port = %port.name,
                address = %address,
                protocols = %port
                    .protocol
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
                limit = port.limit,
                "listener bound"
            );

            loops.push(tokio::spawn(accept_loop(
                listener,
                Arc::new(port.clone()),
                acceptor,
                Arc::clone(&self.handler),
                shutdown.subscribe(),
            )));
        }

        for task in loops {
            let _ = task.await;
        }
        tracing::info!("server stopped");
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    port: Arc<Port>,
    acceptor: Option<TlsAcceptor>,
    handler: Arc<ServerHandler>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, remote) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(port = %port.name, error = %e, "accept failed");
                        continue;
                    }
                };

                // Admission before any byte is read; refusal is silent.
                if !handler.on_accept(&port, remote) {
                    continue;
                }

                let port = Arc::clone(&port);
                let acceptor = acceptor.clone();
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let _guard = ConnectionGuard {
                        handler: Arc::clone(&handler),
                        port: Arc::clone(&port),
                    };

                    let transport: Transport = match &acceptor {
                        Some(tls) => match tls.accept(stream).await {
                            Ok(stream) => Box::new(stream),
                            Err(e) => {
                                tracing::debug!(
                                    port = %port.name,
                                    remote = %remote,
                                    error = %e,
                                    "tls handshake failed"
                                );
                                return;
                            }
                        },
                        None => Box::new(stream),
                    };

                    serve_connection(transport, port, handler, remote).await;
                });
            }
        }
    }
    tracing::debug!(port = %port.name, "accept loop stopped");
}

/// Pairs every counted accept with exactly one close, panics included.
struct ConnectionGuard {
    handler: Arc<ServerHandler>,
    port: Arc<Port>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.handler.on_close(&self.port);
    }
}

/// Sequential request loop for one connection. The next request is read
/// only after the current reply is fully written.
async fn serve_connection(
    mut transport: Transport,
    port: Arc<Port>,
    handler: Arc<ServerHandler>,
    remote: SocketAddr,
) {
    let mut buf: Vec<u8> = Vec::with_capacity(8 * 1024);
    let mut first = true;

    loop {
        let (mut request, consumed) = loop {
            match HttpRequest::parse_head(&buf) {
                Ok(ParsedHead::Complete { request, consumed }) => break (request, consumed),
                Ok(ParsedHead::Partial) => {
                    if buf.len() > MAX_HEAD_BYTES {
                        tracing::debug!(remote = %remote, "request head too large; closing");
                        return;
                    }
                    if read_some(&mut transport, &mut buf).await.is_none() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::debug!(remote = %remote, error = %e, "malformed request; closing");
                    return;
                }
            }
        };

        // Oversized bodies are refused without being buffered.
        let content_length = request.content_length();
        if content_length > handler.max_request_bytes() {
            let _ = transport
                .write_all(&http_reply(400, "Unable to parse request"))
                .await;
            return;
        }
        while buf.len() < consumed + content_length {
            if read_some(&mut transport, &mut buf).await.is_none() {
                return;
            }
        }
        request.body = buf[consumed..consumed + content_length].to_vec();
        buf.drain(..consumed + content_length);

        // The first request decides protocol ownership. Once moved, this
        // loop must never touch the socket again.
        if first {
            first = false;
            match handler.on_handoff(&port, &request, transport, remote) {
                Handoff::Moved => {
                    tracing::debug!(port = %port.name, remote = %remote, "connection handed off");
                    return;
                }
                Handoff::Retained(retained) => transport = retained,
            }
        }

        if !drive_exchange(&mut transport, &port, &handler, request, remote).await {
            let _ = transport.shutdown().await;
            return;
        }
    }
}

/// Hand one request to the handler, then park on the session's event
/// channel until the detached job resolves the exchange. Returns whether
/// the connection stays open.
async fn drive_exchange(
    transport: &mut Transport,
    port: &Arc<Port>,
    handler: &Arc<ServerHandler>,
    request: HttpRequest,
    remote: SocketAddr,
) -> bool {
    let (session, mut events) = HttpSession::new(Arc::clone(port), request, remote);
    let session: Arc<dyn Session> = Arc::new(session);

    handler.on_request(session).await;

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Write(bytes) => {
                if transport.write_all(&bytes).await.is_err() {
                    return false;
                }
            }
            SessionEvent::Complete => return true,
            SessionEvent::Close { graceful } => {
                if graceful {
                    let _ = transport.flush().await;
                }
                return false;
            }
        }
    }

    // The session resolved nothing before dropping; treat as close.
    false
}

async fn read_some(transport: &mut Transport, buf: &mut Vec<u8>) -> Option<usize> {
    let mut chunk = [0u8; 4096];
    match transport.read(&mut chunk).await {
        Ok(0) => None,
        Ok(n) => {
            buf.extend_from_slice(&chunk[..n]);
            Some(n)
        }
        Err(_) => None,
    }
}
