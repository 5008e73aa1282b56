//! Per-request context handed to the command executor.

use serde_json::{Map, Value};

use crate::jobs::queue::JobHandle;
use crate::resource::charge::Charge;
use crate::rpc::role::Role;

/// Everything a command needs about the request it serves. Built per
/// request, discarded once the response is produced.
#[derive(Debug, Clone)]
pub struct RpcContext {
    /// The requested method; also present in `params` under `command`.
    pub method: String,
    /// The effective params object after normalization.
    pub params: Map<String, Value>,
    pub role: Role,
    /// Cost class debited once the request completes.
    pub charge: Charge,
    /// Client identity asserted by a trusted proxy; empty unless the role
    /// is Identified.
    pub user: String,
    pub forwarded_for: String,
    /// The scheduled job this request runs under.
    pub job: JobHandle,
}
