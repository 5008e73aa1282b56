//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup: config → Setup → handler → listeners accept traffic
//! Shutdown: ctrl-c → broadcast → accept loops stop → process exits
//! ```
//!
//! In-flight jobs finish writing through their session channels; only the
//! accept loops observe the signal.

pub mod shutdown;

pub use shutdown::Shutdown;
