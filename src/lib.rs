//! Network front end for a ledger node.
//!
//! Owns every inbound connection: decides which protocol engine a socket
//! belongs to, enforces admission and abuse controls before expensive work
//! happens, and runs each JSON-RPC request as a worker-pool job so the
//! accept path never blocks on ledger work.

pub mod config;
pub mod http;
pub mod jobs;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resource;
pub mod rpc;

pub use config::setup::{Port, Protocol, Setup};
pub use lifecycle::Shutdown;
pub use net::server::Server;
pub use rpc::pipeline::ServerHandler;
