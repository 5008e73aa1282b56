//! Capability tiers and role resolution.

use serde_json::{Map, Value};
use std::net::SocketAddr;

use crate::config::setup::Port;

/// Capability tier assigned to a request. Decides whether forwarded
/// identity headers are honored, which resource ledger is charged, and
/// whether the request is rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Forbidden,
    Guest,
    /// Trusted via the port's secure-gateway address; forwarded identity
    /// headers are honored.
    Identified,
    Admin,
    Unlimited,
}

impl Role {
    /// Privileged roles bypass per-endpoint resource accounting.
    pub fn is_unlimited(self) -> bool {
        matches!(self, Role::Admin | Role::Unlimited)
    }
}

/// Minimum role demanded before a command may run. Keyed by the request's
/// id string; unknown keys demand nothing beyond Guest.
pub fn role_required(key: &str) -> Role {
    match key {
        "stop" | "peers" | "consensus_info" | "validation_create" | "wallet_propose" => Role::Admin,
        _ => Role::Guest,
    }
}

/// Resolves the capability tier for one request. The pipeline supplies the
/// inputs; the policy owns the trust decisions.
pub trait RolePolicy: Send + Sync {
    fn resolve(
        &self,
        required: Role,
        port: &Port,
        params: &Map<String, Value>,
        remote: SocketAddr,
        user_header: &str,
    ) -> Role;
}

/// Default trust rules.
///
/// Secure-gateway traffic is identified; admin-listed remotes carrying the
/// configured admin credentials (in params) are administrators; anything
/// demanding Admin without earning it is forbidden; the rest are guests.
#[derive(Debug, Default)]
pub struct StandardRolePolicy;

impl RolePolicy for StandardRolePolicy {
    fn resolve(
        &self,
        required: Role,
        port: &Port,
        params: &Map<String, Value>,
        remote: SocketAddr,
        _user_header: &str,
    ) -> Role {
        if port.secure_gateway == Some(remote.ip()) {
            return Role::Identified;
        }

        let ip_allowed = port.admin_ips.iter().any(|ip| *ip == remote.ip());
        if ip_allowed {
            let user_ok = port
                .admin_user
                .as_deref()
                .map_or(true, |u| params.get("admin_user").and_then(Value::as_str) == Some(u));
            let password_ok = port.admin_password.as_deref().map_or(true, |p| {
                params.get("admin_password").and_then(Value::as_str) == Some(p)
            });
            if user_ok && password_ok {
                return Role::Admin;
            }
        }

        if required == Role::Admin {
            return Role::Forbidden;
        }

        Role::Guest
    }
}
