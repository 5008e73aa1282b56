//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → setup.rs (semantic validation, protocol rules)
//!     → Setup (validated, immutable)
//!     → shared via Arc to the server and handler
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the gateway never reloads at runtime
//! - The [server] section doubles as shared defaults for every port section
//! - Validation separates syntactic (serde) from semantic checks; any
//!   semantic failure aborts startup

pub mod loader;
pub mod schema;
pub mod setup;

pub use schema::GatewayConfig;
pub use setup::{build_setup, Port, Protocol, Setup, SetupError};
