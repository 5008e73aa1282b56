//! Worker-pool job scheduling.
//!
//! # Data Flow
//! ```text
//! Accept task (protocol/auth gates passed)
//!     → queue.rs (job posted to the worker channel; session handle moves
//!       with it)
//!     → worker task runs the JSON-RPC pipeline to completion
//!     → session resumes via its event channel (reply, keep-alive/close)
//! ```
//!
//! # Design Decisions
//! - The accept path never runs ledger work; it only posts jobs
//! - A full queue applies backpressure to the accept task, not a drop
//! - Hung jobs hold their session detached; timeouts are the scheduler
//!   operator's concern, not this layer's

pub mod queue;

pub use queue::{JobHandle, JobKind, JobQueue};
