//! The JSON-RPC request pipeline.
//!
//! # Responsibilities
//! - Gate requests on port protocol and Basic auth before scheduling
//! - Detach the session into a client-RPC job; the accept task never
//!   waits on ledger work
//! - Validate the envelope, resolve the role, apply the resource gate
//! - Dispatch to the command executor and shape the response
//! - Record metrics and debit the endpoint exactly once per processed
//!   request

use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::schema::LimitsConfig;
use crate::config::setup::Port;
use crate::http::request::HttpRequest;
use crate::http::response::http_reply;
use crate::jobs::queue::{JobHandle, JobKind, JobQueue};
use crate::net::counter::ConnectionCounter;
use crate::net::session::Session;
use crate::observability::metrics;
use crate::resource::charge::FEE_REFERENCE_RPC;
use crate::resource::manager::ResourceManager;
use crate::rpc::auth::authorized;
use crate::rpc::context::RpcContext;
use crate::rpc::executor::RpcExecutor;
use crate::rpc::handoff::{self, Handoff, OverlayEngine, Transport, WebsocketEngine};
use crate::rpc::role::{role_required, Role, RolePolicy};

/// Replies longer than this are truncated in debug logs.
const MAX_REPLY_LOG_BYTES: usize = 10_000;

/// Front-end handler for every inbound connection: admission, handoff,
/// auth, and the JSON-RPC pipeline.
pub struct ServerHandler {
    counter: ConnectionCounter,
    jobs: JobQueue,
    executor: Arc<dyn RpcExecutor>,
    policy: Arc<dyn RolePolicy>,
    resources: ResourceManager,
    overlay: Arc<dyn OverlayEngine>,
    websocket: Arc<dyn WebsocketEngine>,
    max_request_bytes: usize,
}

impl ServerHandler {
    pub fn new(
        limits: &LimitsConfig,
        resources: ResourceManager,
        executor: Arc<dyn RpcExecutor>,
        policy: Arc<dyn RolePolicy>,
        overlay: Arc<dyn OverlayEngine>,
        websocket: Arc<dyn WebsocketEngine>,
    ) -> Arc<Self> {
        Arc::new(Self {
            counter: ConnectionCounter::new(),
            jobs: JobQueue::start(limits.job_workers, limits.job_queue_depth),
            executor,
            policy,
            resources,
            overlay,
            websocket,
            max_request_bytes: limits.max_request_bytes,
        })
    }

    /// Admission at accept time. A refused connection is dropped without
    /// any protocol-level reply.
    pub fn on_accept(&self, port: &Port, remote: SocketAddr) -> bool {
        self.counter.on_accept(port, remote)
    }

    pub fn on_close(&self, port: &Port) {
        self.counter.on_close(port);
    }

    /// Live connections on a port; admission bookkeeping introspection.
    pub fn connection_count(&self, port: &Port) -> usize {
        self.counter.count(port)
    }

    /// Largest request body the pipeline will parse.
    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    /// Decide, on the first request, who owns this connection from here
    /// on.
    pub fn on_handoff(
        &self,
        port: &Port,
        request: &HttpRequest,
        transport: Transport,
        remote: SocketAddr,
    ) -> Handoff {
        handoff::dispatch(
            port,
            request,
            transport,
            remote,
            &*self.overlay,
            &*self.websocket,
        )
    }

    /// Entry point for a retained request. Runs the cheap gates inline,
    /// then detaches the session into a scheduled job.
    pub async fn on_request(self: &Arc<Self>, session: Arc<dyn Session>) {
        let port = session.port();

        // RPC must be enabled on the port.
        if !port.rpc() {
            session.write(&http_reply(403, "Forbidden"));
            session.close(true);
            return;
        }

        if !authorized(port, session.request()) {
            session.write(&http_reply(403, "Forbidden"));
            session.close(true);
            return;
        }

        let handler = Arc::clone(self);
        self.jobs
            .post(JobKind::ClientRpc, "RPC-Client", async move {
                handler.process_session(session).await;
            })
            .await;
    }

    /// Job body: run the pipeline, then resolve the exchange.
    pub async fn process_session(&self, session: Arc<dyn Session>) {
        let request = session.request();
        let forwarded_for = request
            .header("X-Forwarded-For")
            .unwrap_or_default()
            .to_string();
        let user = request.header("X-User").unwrap_or_default().to_string();
        let job = JobHandle::new(JobKind::ClientRpc, "RPC-Client");

        self.process_request(
            session.port(),
            &request.body,
            session.remote_address(),
            |bytes| session.write(bytes),
            &job,
            forwarded_for,
            user,
        )
        .await;

        if session.request().keep_alive() {
            session.complete();
        } else {
            session.close(true);
        }
    }

    /// The envelope-to-reply state machine for one request.
    #[allow(clippy::too_many_arguments)]
    pub async fn process_request(
        &self,
        port: &Port,
        body: &[u8],
        remote: SocketAddr,
        output: impl Fn(&[u8]),
        job: &JobHandle,
        forwarded_for: String,
        user: String,
    ) {
        // Envelope: size cap, JSON, object shape.
        if body.len() > self.max_request_bytes {
            output(&http_reply(400, "Unable to parse request"));
            return;
        }
        let envelope: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(_) => {
                output(&http_reply(400, "Unable to parse request"));
                return;
            }
        };
        let Value::Object(envelope) = envelope else {
            output(&http_reply(400, "Unable to parse request"));
            return;
        };

        let method = match envelope.get("method") {
            None | Some(Value::Null) => {
                output(&http_reply(400, "Null method"));
                return;
            }
            Some(Value::String(method)) => method.clone(),
            Some(_) => {
                output(&http_reply(400, "method is not string"));
                return;
            }
        };
        if method.is_empty() {
            output(&http_reply(400, "method is empty"));
            return;
        }

        // Role resolution. The id string keys the requirement policy; the
        // first object in params, if any, is the resolution hint.
        let id_key = envelope
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let required = role_required(id_key);
        let empty_hint = Map::new();
        let role_hint = envelope
            .get("params")
            .and_then(Value::as_array)
            .and_then(|array| array.first())
            .and_then(Value::as_object)
            .unwrap_or(&empty_hint);
        let role = self.policy.resolve(required, port, role_hint, remote, &user);

        // Identity headers are trusted only from the secure gateway;
        // everyone else must not be able to spoof them.
        let (user, forwarded_for) = if role == Role::Identified {
            (user, forwarded_for)
        } else {
            (String::new(), String::new())
        };

        // Resource gate: shed exhausted endpoints before any command work.
        let consumer = if role.is_unlimited() {
            self.resources
                .new_unlimited_endpoint(remote.ip().to_string())
        } else {
            self.resources.new_inbound_endpoint(remote.ip())
        };
        if consumer.should_disconnect() {
            output(&http_reply(503, "Server is overloaded"));
            return;
        }

        // Params: absent means empty; otherwise exactly one object in an
        // array.
        let mut params = match envelope.get("params") {
            None => Map::new(),
            Some(Value::Array(array)) if array.len() == 1 => match &array[0] {
                Value::Object(object) => object.clone(),
                _ => {
                    output(&http_reply(400, "params unparseable"));
                    return;
                }
            },
            Some(_) => {
                output(&http_reply(400, "params unparseable"));
                return;
            }
        };

        if role == Role::Forbidden {
            // TODO: rate-limit repeated failures so credentials cannot be
            // brute-forced through this branch.
            output(&http_reply(403, "Forbidden"));
            return;
        }

        let charge = FEE_REFERENCE_RPC;
        tracing::debug!(method = %method, "query");

        // The method travels inside params under the reserved command key.
        params.insert("command".into(), Value::String(method.clone()));

        let started = Instant::now();
        let context = RpcContext {
            method: method.clone(),
            params: params.clone(),
            role,
            charge,
            user,
            forwarded_for,
            job: *job,
        };
        let mut result = self.executor.call(context).await;

        // Always report status; on an error echo the request as received.
        if result.contains_key("error") {
            result.insert("status".into(), Value::String("error".into()));
            result.insert("request".into(), Value::Object(params));
            tracing::debug!(
                error = %result.get("error").cloned().unwrap_or(serde_json::Value::Null),
                "rpc error"
            );
        } else {
            result.insert("status".into(), Value::String("success".into()));
        }

        let reply = json!({ "result": Value::Object(result) });
        let mut response = reply.to_string();
        response.push('\n');

        metrics::record_rpc(&method, started.elapsed(), response.len());
        consumer.charge(charge);

        if response.len() <= MAX_REPLY_LOG_BYTES {
            tracing::debug!(reply = %response.trim_end(), "reply");
        } else {
            let truncated = String::from_utf8_lossy(&response.as_bytes()[..MAX_REPLY_LOG_BYTES]);
            tracing::debug!(reply = %truncated, "reply truncated");
        }

        output(&http_reply(200, &response));
    }
}
