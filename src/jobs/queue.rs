//! Bounded job queue backed by a tokio worker pool.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};

/// Classes of scheduled work, used for tagging and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// A client JSON-RPC request.
    ClientRpc,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::ClientRpc => "client_rpc",
        }
    }
}

/// Identity of the job a piece of work runs under; carried into the RPC
/// context so executors know their scheduling class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHandle {
    pub kind: JobKind,
    pub name: &'static str,
}

impl JobHandle {
    pub fn new(kind: JobKind, name: &'static str) -> Self {
        Self { kind, name }
    }
}

struct Job {
    kind: JobKind,
    name: &'static str,
    work: Pin<Box<dyn Future<Output = ()> + Send>>,
}

/// A bounded queue feeding a fixed pool of worker tasks.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Start `workers` tasks draining a queue of the given depth.
    pub fn start(workers: usize, depth: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(depth.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else {
                        break;
                    };
                    let started = Instant::now();
                    tracing::trace!(worker, job = job.name, kind = job.kind.as_str(), "job start");
                    job.work.await;
                    tracing::trace!(
                        worker,
                        job = job.name,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "job done"
                    );
                }
            });
        }

        Self { tx }
    }

    /// Post a unit of work. Waits when the queue is full; the caller is an
    /// accept task and backpressure there is intended.
    pub async fn post<F>(&self, kind: JobKind, name: &'static str, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let job = Job {
            kind,
            name,
            work: Box::pin(work),
        };
        if self.tx.send(job).await.is_err() {
            tracing::warn!(job = name, "job queue closed; dropping work");
        }
    }
}
