//! Shared utilities for integration testing.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ledger_gateway::config::schema::LimitsConfig;
use ledger_gateway::config::setup::{Port, Protocol};
use ledger_gateway::http::request::HttpRequest;
use ledger_gateway::net::session::Session;
use ledger_gateway::resource::{ResourceManager, ResourceSettings};
use ledger_gateway::rpc::context::RpcContext;
use ledger_gateway::rpc::executor::RpcExecutor;
use ledger_gateway::rpc::handoff::{DisabledOverlay, DisabledWebsocket};
use ledger_gateway::rpc::role::StandardRolePolicy;
use ledger_gateway::ServerHandler;

/// A port serving plain HTTP RPC with no credentials.
pub fn http_port() -> Port {
    Port {
        name: "rpc".into(),
        ip: "127.0.0.1".parse().unwrap(),
        port: 5005,
        protocol: [Protocol::Http].into_iter().collect::<BTreeSet<_>>(),
        user: None,
        password: None,
        admin_ips: Vec::new(),
        admin_user: None,
        admin_password: None,
        secure_gateway: None,
        ssl_key: None,
        ssl_cert: None,
        ssl_chain: None,
        limit: 0,
    }
}

/// A POST carrying the given JSON body.
pub fn json_request(body: &str) -> HttpRequest {
    HttpRequest {
        method: "POST".into(),
        target: "/".into(),
        version: 1,
        headers: vec![("Content-Length".into(), body.len().to_string())],
        body: body.as_bytes().to_vec(),
    }
}

pub fn remote() -> SocketAddr {
    "198.51.100.20:40000".parse().unwrap()
}

/// Session double recording everything the pipeline does to it.
pub struct MockSession {
    port: Arc<Port>,
    request: HttpRequest,
    remote: SocketAddr,
    written: Mutex<Vec<u8>>,
    completed: AtomicBool,
    closed: AtomicBool,
}

impl MockSession {
    pub fn new(port: Port, request: HttpRequest, remote: SocketAddr) -> Arc<Self> {
        Arc::new(Self {
            port: Arc::new(port),
            request,
            remote,
            written: Mutex::new(Vec::new()),
            completed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    /// Status code of the first reply written to this session.
    pub fn response_status(&self) -> Option<u16> {
        let written = self.written();
        let text = String::from_utf8_lossy(&written);
        text.strip_prefix("HTTP/1.1 ")?
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    }

    /// Body of the reply written to this session.
    pub fn response_body(&self) -> String {
        let written = self.written();
        let text = String::from_utf8_lossy(&written);
        text.split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default()
    }

    pub fn was_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn resolved(&self) -> bool {
        self.was_completed() || self.was_closed()
    }
}

impl Session for MockSession {
    fn port(&self) -> &Port {
        &self.port
    }

    fn request(&self) -> &HttpRequest {
        &self.request
    }

    fn remote_address(&self) -> SocketAddr {
        self.remote
    }

    fn write(&self, bytes: &[u8]) {
        self.written.lock().unwrap().extend_from_slice(bytes);
    }

    fn complete(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    fn close(&self, _graceful: bool) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Executor answering every call with a fixed result.
pub struct StubExecutor {
    result: Map<String, Value>,
    pub calls: AtomicUsize,
}

impl StubExecutor {
    pub fn returning(result: Map<String, Value>) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::returning(Map::new())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcExecutor for StubExecutor {
    async fn call(&self, _context: RpcContext) -> Map<String, Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Executor capturing the context it was dispatched with.
#[derive(Default)]
pub struct RecordingExecutor {
    pub last_context: Mutex<Option<RpcContext>>,
}

impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn context(&self) -> Option<RpcContext> {
        self.last_context.lock().unwrap().clone()
    }
}

#[async_trait]
impl RpcExecutor for RecordingExecutor {
    async fn call(&self, context: RpcContext) -> Map<String, Value> {
        *self.last_context.lock().unwrap() = Some(context);
        Map::new()
    }
}

/// Resource settings with no decay, so balances are deterministic.
pub fn strict_resources(drop_threshold: u64) -> ResourceManager {
    ResourceManager::new(ResourceSettings {
        warn_threshold: drop_threshold,
        drop_threshold,
        decay_per_second: 0,
    })
}

/// Handler wired with the given executor and defaults everywhere else.
pub fn handler_with(executor: Arc<dyn RpcExecutor>) -> Arc<ServerHandler> {
    handler_with_resources(executor, ResourceManager::default())
}

pub fn handler_with_resources(
    executor: Arc<dyn RpcExecutor>,
    resources: ResourceManager,
) -> Arc<ServerHandler> {
    handler_with_limits(executor, resources, LimitsConfig::default())
}

pub fn handler_with_limits(
    executor: Arc<dyn RpcExecutor>,
    resources: ResourceManager,
    limits: LimitsConfig,
) -> Arc<ServerHandler> {
    ServerHandler::new(
        &limits,
        resources,
        executor,
        Arc::new(StandardRolePolicy),
        Arc::new(DisabledOverlay),
        Arc::new(DisabledWebsocket),
    )
}
