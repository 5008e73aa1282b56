//! Command dispatch seam.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::rpc::context::RpcContext;

/// Runs one RPC command to completion. Implementations may suspend freely;
/// they execute on the worker pool, never on the accept path.
///
/// The returned object is the command's result; an `error` member marks an
/// RPC-level failure and is echoed back inside a 200 response.
#[async_trait]
pub trait RpcExecutor: Send + Sync {
    async fn call(&self, context: RpcContext) -> Map<String, Value>;
}

/// Build an RPC-level error object.
pub fn rpc_error(code: &str, message: impl Into<String>) -> Map<String, Value> {
    let mut error = Map::new();
    error.insert("error".into(), Value::String(code.into()));
    error.insert("error_message".into(), Value::String(message.into()));
    error
}

/// Minimal built-in command set for nodes run without a ledger engine
/// wired in.
#[derive(Debug, Default)]
pub struct BasicExecutor;

#[async_trait]
impl RpcExecutor for BasicExecutor {
    async fn call(&self, context: RpcContext) -> Map<String, Value> {
        match context.method.as_str() {
            "ping" => Map::new(),
            other => rpc_error("unknownCmd", format!("unknown method: {other}")),
        }
    }
}
