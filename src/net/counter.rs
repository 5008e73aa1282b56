//! Per-port concurrent-connection accounting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

use crate::config::setup::Port;
use crate::observability::metrics;

/// Tracks live connections per port and enforces each port's limit.
///
/// Owned by the handler that serves the ports, not ambient state. All
/// counts live behind one mutex scoped to the increment/decrement pairs;
/// this is the only accept-path state shared across connections.
#[derive(Debug, Default)]
pub struct ConnectionCounter {
    counts: Mutex<HashMap<String, usize>>,
}

impl ConnectionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a new connection. Returns false when the port's limit
    /// is exhausted; a refused connection is not counted and needs no
    /// matching [`ConnectionCounter::on_close`].
    pub fn on_accept(&self, port: &Port, remote: SocketAddr) -> bool {
        let mut counts = self.counts.lock().expect("connection counter mutex poisoned");
        let count = counts.entry(port.name.clone()).or_insert(0);
        *count += 1;

        if port.limit != 0 && *count > port.limit {
            *count -= 1;
            tracing::trace!(port = %port.name, remote = %remote, "port is full; dropping connection");
            metrics::record_connection_refused(&port.name);
            return false;
        }

        true
    }

    /// Account for a closed connection.
    pub fn on_close(&self, port: &Port) {
        let mut counts = self.counts.lock().expect("connection counter mutex poisoned");
        if let Some(count) = counts.get_mut(&port.name) {
            *count = count.saturating_sub(1);
        }
    }

    /// Live connections on the named port.
    pub fn count(&self, port: &Port) -> usize {
        let counts = self.counts.lock().expect("connection counter mutex poisoned");
        counts.get(&port.name).copied().unwrap_or(0)
    }
}
