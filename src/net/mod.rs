//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → server.rs (accept loop, per-port admission via counter.rs)
//!     → tls.rs (optional TLS handshake)
//!     → first request parsed, handoff decided
//!     → session.rs (detachable session; the JSON-RPC job resumes it
//!       through its event channel)
//! ```
//!
//! # Design Decisions
//! - Admission is counted per port under one mutex; refusal is silent at
//!   the protocol level
//! - Sessions are sequential: the next request is read only after the
//!   current reply is fully written
//! - The serve loop owns the raw stream so peer connections can be handed
//!   to the overlay engine whole

pub mod counter;
pub mod server;
pub mod session;
pub mod tls;

pub use counter::ConnectionCounter;
pub use server::Server;
pub use session::{HttpSession, Session, SessionEvent};
