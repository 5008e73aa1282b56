//! JSON-RPC front-end pipeline.
//!
//! # Data Flow
//! ```text
//! Accepted connection, first request
//!     → handoff.rs (websocket / peer ports surrender the socket)
//!     → pipeline.rs gate: RPC protocol + Basic auth (auth.rs)
//!     → job posted; worker resumes the session
//!     → pipeline.rs: envelope checks, role resolution (role.rs),
//!       resource gate, params shaping
//!     → executor.rs runs the command (context.rs carries the request)
//!     → response shaped, metrics recorded, endpoint charged, reply written
//! ```
//!
//! # Design Decisions
//! - Fail closed: every gate rejects before work, not after
//! - RPC-level errors ride inside 200 bodies; HTTP status is transport-only
//! - Identity headers are honored only for secure-gateway traffic

pub mod auth;
pub mod context;
pub mod executor;
pub mod handoff;
pub mod pipeline;
pub mod role;

pub use context::RpcContext;
pub use executor::{BasicExecutor, RpcExecutor};
pub use handoff::{Handoff, OverlayEngine, WebsocketEngine};
pub use pipeline::ServerHandler;
pub use role::{Role, RolePolicy, StandardRolePolicy};
