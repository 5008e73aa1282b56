//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline and admission produce:
//!     → metrics.rs (counters, histograms)
//!     → Prometheus scrape endpoint
//!
//! Structured logs flow through `tracing`, initialized in main.
//! ```
//!
//! # Design Decisions
//! - Metric updates are cheap atomic operations on the request path
//! - Request wall time, count, and reply size are recorded per RPC
//! - The exporter is optional; recording without it is a no-op

pub mod metrics;
