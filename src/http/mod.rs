//! HTTP wire representation.
//!
//! # Data Flow
//! ```text
//! TCP/TLS stream bytes
//!     → request.rs (incremental head parse, header lookup, keep-alive)
//!     → [handoff / JSON-RPC pipeline decide what owns the exchange]
//!     → response.rs (raw status-line reply bytes)
//!     → Written back through the session
//! ```
//!
//! The gateway speaks plain HTTP/1.1 at this layer; anything richer
//! (websocket frames, peer wire protocol) belongs to the engine the
//! connection is handed off to.

pub mod request;
pub mod response;

pub use request::{HttpError, HttpRequest, ParsedHead};
pub use response::http_reply;
