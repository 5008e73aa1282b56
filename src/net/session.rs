//! Detachable request sessions.
//!
//! A session is one accepted connection's current exchange. The serve loop
//! hands an `Arc<dyn Session>` into a scheduled job and then parks on the
//! session's event channel; the job writes its reply and resolves the
//! exchange from another task entirely. That channel is the continuation:
//! no suspension primitive, just a handle moved across the pool boundary.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::setup::Port;
use crate::http::request::HttpRequest;

/// One accepted connection/request as the RPC pipeline sees it.
pub trait Session: Send + Sync {
    /// The port this connection was accepted on.
    fn port(&self) -> &Port;

    /// The parsed inbound request.
    fn request(&self) -> &HttpRequest;

    fn remote_address(&self) -> SocketAddr;

    /// Queue reply bytes toward the client.
    fn write(&self, bytes: &[u8]);

    /// Mark the exchange complete; the connection stays open for the next
    /// request.
    fn complete(&self);

    /// Close the connection once queued writes (graceful) or immediately.
    fn close(&self, graceful: bool);
}

/// Resume events flowing from a detached session back to its serve loop.
#[derive(Debug)]
pub enum SessionEvent {
    Write(Vec<u8>),
    Complete,
    Close { graceful: bool },
}

/// Channel-backed [`Session`] used by the real server.
pub struct HttpSession {
    port: Arc<Port>,
    request: HttpRequest,
    remote: SocketAddr,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl HttpSession {
    pub fn new(
        port: Arc<Port>,
        request: HttpRequest,
        remote: SocketAddr,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                port,
                request,
                remote,
                events,
            },
            rx,
        )
    }
}

impl Session for HttpSession {
    fn port(&self) -> &Port {
        &self.port
    }

    fn request(&self) -> &HttpRequest {
        &self.request
    }

    fn remote_address(&self) -> SocketAddr {
        self.remote
    }

    fn write(&self, bytes: &[u8]) {
        // A dead receiver means the connection is already gone; the write
        // is simply lost.
        let _ = self.events.send(SessionEvent::Write(bytes.to_vec()));
    }

    fn complete(&self) {
        let _ = self.events.send(SessionEvent::Complete);
    }

    fn close(&self, graceful: bool) {
        let _ = self.events.send(SessionEvent::Close { graceful });
    }
}
