//! Configuration schema definitions.
//!
//! This module defines the raw on-disk configuration structure for the
//! gateway. All types derive Serde traits for deserialization from config
//! files; semantic validation happens in [`crate::config::setup`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// The `[server]` section: which ports exist, plus shared defaults.
    /// Required; its absence is a fatal startup error.
    pub server: Option<ServerSection>,

    /// Named `[port.<name>]` sections referenced from `[server]`.
    pub port: BTreeMap<String, PortSection>,

    /// Run without networking to peers; the peer protocol is stripped
    /// from every port.
    pub standalone: bool,

    /// Request-size and worker-pool limits.
    pub limits: LimitsConfig,

    /// Abuse/congestion ledger thresholds.
    pub resource: ResourceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// The `[server]` section.
///
/// `ports` enumerates the port sections to configure. Every other field
/// acts as a shared default merged into each named section.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServerSection {
    /// Names of the `[port.<name>]` sections to bring up.
    pub ports: Vec<String>,

    /// Shared defaults applied to every port unless overridden.
    #[serde(flatten)]
    pub defaults: PortSection,
}

/// One `[port.<name>]` section. All fields optional here; requiredness is
/// enforced during setup, after defaults from `[server]` are merged in.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PortSection {
    /// Bind IP (e.g., "0.0.0.0").
    pub ip: Option<String>,

    /// Bind TCP port; zero is invalid.
    pub port: Option<u16>,

    /// Comma/space-separated protocol set drawn from
    /// http, https, ws, wss, peer.
    pub protocol: Option<String>,

    /// Basic-auth credentials required on this port.
    pub user: Option<String>,
    pub password: Option<String>,

    /// IPs allowed to act as administrator.
    pub admin: Option<Vec<String>>,

    /// Credentials demanded from administrators, carried in request params.
    pub admin_user: Option<String>,
    pub admin_password: Option<String>,

    /// Trusted proxy IP whose forwarded-identity headers are honored.
    pub secure_gateway: Option<String>,

    /// TLS material (PEM paths).
    pub ssl_key: Option<String>,
    pub ssl_cert: Option<String>,
    pub ssl_chain: Option<String>,

    /// Maximum concurrent connections; zero means unlimited.
    pub limit: Option<usize>,
}

impl PortSection {
    /// Overlay this section on top of shared defaults; explicit values win.
    pub fn merged_over(&self, defaults: &PortSection) -> PortSection {
        PortSection {
            ip: self.ip.clone().or_else(|| defaults.ip.clone()),
            port: self.port.or(defaults.port),
            protocol: self.protocol.clone().or_else(|| defaults.protocol.clone()),
            user: self.user.clone().or_else(|| defaults.user.clone()),
            password: self.password.clone().or_else(|| defaults.password.clone()),
            admin: self.admin.clone().or_else(|| defaults.admin.clone()),
            admin_user: self.admin_user.clone().or_else(|| defaults.admin_user.clone()),
            admin_password: self
                .admin_password
                .clone()
                .or_else(|| defaults.admin_password.clone()),
            secure_gateway: self
                .secure_gateway
                .clone()
                .or_else(|| defaults.secure_gateway.clone()),
            ssl_key: self.ssl_key.clone().or_else(|| defaults.ssl_key.clone()),
            ssl_cert: self.ssl_cert.clone().or_else(|| defaults.ssl_cert.clone()),
            ssl_chain: self.ssl_chain.clone().or_else(|| defaults.ssl_chain.clone()),
            limit: self.limit.or(defaults.limit),
        }
    }
}

/// Request-size and scheduling limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum JSON-RPC request body size in bytes.
    pub max_request_bytes: usize,

    /// Worker tasks processing client RPC jobs.
    pub job_workers: usize,

    /// Depth of the job queue before posting applies backpressure.
    pub job_queue_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_bytes: 1024 * 1024, // 1MB
            job_workers: 4,
            job_queue_depth: 256,
        }
    }
}

/// Abuse/congestion ledger thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Balance at which an endpoint is logged as misbehaving.
    pub warn_threshold: u64,

    /// Balance at which an endpoint is refused with 503.
    pub drop_threshold: u64,

    /// Balance units forgiven per second of quiet.
    pub decay_per_second: u64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            warn_threshold: 500,
            drop_threshold: 1500,
            decay_per_second: 100,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
