//! Protocol ownership transfer.
//!
//! # Responsibilities
//! - Decide, per accepted connection and first request, whether this
//!   pipeline keeps the session or another engine takes the socket
//! - Detect websocket upgrade requests
//!
//! Once a connection is `Moved`, this pipeline must never touch it again.

use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::setup::{Port, Protocol};
use crate::http::request::HttpRequest;

/// A connection's raw byte stream, plain TCP or TLS-wrapped.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

pub type Transport = Box<dyn AsyncStream>;

/// Outcome of the handoff decision, consumed exhaustively by the serve
/// loop.
pub enum Handoff {
    /// This pipeline keeps the session; the transport comes back.
    Retained(Transport),
    /// Another engine owns the socket now.
    Moved,
}

/// Takes ownership of peer connections; never returns control.
pub trait OverlayEngine: Send + Sync {
    fn on_handoff(&self, transport: Transport, request: HttpRequest, remote: SocketAddr);
}

/// Takes ownership of websocket upgrades; never returns control.
pub trait WebsocketEngine: Send + Sync {
    fn on_upgrade(&self, transport: Transport, request: HttpRequest, remote: SocketAddr);
}

/// Whether the request is a websocket upgrade: it must declare the HTTP
/// upgrade mechanism and name the websocket protocol, case-insensitively.
pub fn is_websocket_upgrade(request: &HttpRequest) -> bool {
    request.is_upgrade()
        && request
            .header("Upgrade")
            .map(|v| v.eq_ignore_ascii_case("websocket"))
            .unwrap_or(false)
}

/// Decide who owns this connection from here on.
pub fn dispatch(
    port: &Port,
    request: &HttpRequest,
    transport: Transport,
    remote: SocketAddr,
    overlay: &dyn OverlayEngine,
    websocket: &dyn WebsocketEngine,
) -> Handoff {
    if port.has(Protocol::Wss) && is_websocket_upgrade(request) {
        websocket.on_upgrade(transport, request.clone(), remote);
        return Handoff::Moved;
    }

    // Peer ports surrender the socket unconditionally; the overlay takes
    // over protocol negotiation from the first request.
    if port.has(Protocol::Peer) {
        overlay.on_handoff(transport, request.clone(), remote);
        return Handoff::Moved;
    }

    if port.has(Protocol::Ws) && is_websocket_upgrade(request) {
        websocket.on_upgrade(transport, request.clone(), remote);
        return Handoff::Moved;
    }

    Handoff::Retained(transport)
}

/// Placeholder overlay for nodes run without a peer engine wired in; the
/// connection is dropped.
#[derive(Debug, Default)]
pub struct DisabledOverlay;

impl OverlayEngine for DisabledOverlay {
    fn on_handoff(&self, _transport: Transport, _request: HttpRequest, remote: SocketAddr) {
        tracing::debug!(remote = %remote, "no overlay engine wired; dropping peer connection");
    }
}

/// Placeholder websocket engine; upgrades are declined by dropping the
/// socket.
#[derive(Debug, Default)]
pub struct DisabledWebsocket;

impl WebsocketEngine for DisabledWebsocket {
    fn on_upgrade(&self, _transport: Transport, _request: HttpRequest, remote: SocketAddr) {
        tracing::debug!(remote = %remote, "no websocket engine wired; dropping upgrade");
    }
}
