use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::job::{DeadJob, Job, JobHandler};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub capacity: usize,
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            capacity: 256,
            max_attempts: 3,
            base_backoff: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("no handler registered for topic {0}")]
    UnknownTopic(String),

    #[error("dispatcher is shut down")]
    Closed,
}

struct Inner {
    tx: mpsc::Sender<Job>,
    handlers: RwLock<HashMap<String, Arc<dyn JobHandler>>>,
    dead: Mutex<Vec<DeadJob>>,
    in_flight: AtomicUsize,
    shutting_down: AtomicBool,
    config: DispatcherConfig,
}

/// Bounded worker pool consuming an in-process channel.
///
/// Failed handler invocations are requeued with exponential backoff
/// (base delay doubling per attempt) up to `max_attempts`, after which the
/// job is parked dead. A failure never propagates to the enqueuing caller.
pub struct JobDispatcher {
    inner: Arc<Inner>,
    rx: Mutex<Option<mpsc::Receiver<Job>>>,
}

impl JobDispatcher {
    pub fn new(config: DispatcherConfig) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.capacity);
        Arc::new(Self {
            inner: Arc::new(Inner {
                tx,
                handlers: RwLock::new(HashMap::new()),
                dead: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                shutting_down: AtomicBool::new(false),
                config,
            }),
            rx: Mutex::new(Some(rx)),
        })
    }

    /// Register the handler for a topic. Must happen before `start`.
    pub fn register_handler(&self, topic: &str, handler: Arc<dyn JobHandler>) {
        self.inner
            .handlers
            .write()
            .unwrap()
            .insert(topic.to_string(), handler);
    }

    /// Spawn the worker pool. Call once.
    pub fn start(&self) {
        let rx = {
            let mut slot = self.rx.lock().unwrap();
            slot.take().expect("dispatcher already started")
        };
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        for worker_id in 0..self.inner.config.workers {
            let inner = Arc::clone(&self.inner);
            let rx = Arc::clone(&rx);
            tokio::spawn(async move {
                worker_loop(inner, worker_id, rx).await;
            });
        }
        info!(workers = self.inner.config.workers, "job dispatcher started");
    }

    /// Hand off a payload for asynchronous delivery. Fails only when the
    /// topic has no registered handler or the dispatcher is draining.
    pub async fn enqueue(
        &self,
        topic: &str,
        payload: serde_json::Value,
    ) -> Result<Uuid, QueueError> {
        if !self.inner.handlers.read().unwrap().contains_key(topic) {
            return Err(QueueError::UnknownTopic(topic.to_string()));
        }
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let job = Job::new(topic, payload);
        let job_id = job.id;

        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.inner.tx.send(job).await.is_err() {
            self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed);
        }

        Ok(job_id)
    }

    /// Jobs that exhausted their retry budget.
    pub fn dead_jobs(&self) -> Vec<DeadJob> {
        self.inner.dead.lock().unwrap().clone()
    }

    /// Outstanding jobs: queued, executing, or waiting out a backoff.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Stop accepting work and wait for outstanding jobs (including backoff
    /// waits) to reach a terminal state.
    pub async fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        while self.inner.in_flight.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        info!("job dispatcher drained");
    }
}

async fn worker_loop(
    inner: Arc<Inner>,
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
) {
    loop {
        // Hold the receiver lock only while polling so sibling workers can
        // take the next job as soon as this one starts executing.
        let job = {
            let mut rx = rx.lock().await;
            match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
                Ok(Some(job)) => job,
                Ok(None) => return,
                Err(_) => {
                    if inner.shutting_down.load(Ordering::SeqCst)
                        && inner.in_flight.load(Ordering::SeqCst) == 0
                    {
                        return;
                    }
                    continue;
                }
            }
        };

        process(&inner, worker_id, job).await;
    }
}

async fn process(inner: &Arc<Inner>, worker_id: usize, mut job: Job) {
    let handler = inner.handlers.read().unwrap().get(&job.topic).cloned();
    let Some(handler) = handler else {
        // Handlers cannot be deregistered, so this only happens on a
        // misconfigured start; park the job rather than lose it.
        park(inner, job, "no handler registered".to_string());
        return;
    };

    job.attempt += 1;
    match handler.handle(&job).await {
        Ok(()) => {
            info!(job_id = %job.id, topic = %job.topic, attempt = job.attempt, "job done");
            inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        Err(err) if job.attempt >= inner.config.max_attempts => {
            error!(
                job_id = %job.id,
                topic = %job.topic,
                attempt = job.attempt,
                error = %err,
                "job dead after exhausting retries"
            );
            park(inner, job, err.to_string());
        }
        Err(err) => {
            let backoff = inner.config.base_backoff * 2u32.pow(job.attempt - 1);
            warn!(
                job_id = %job.id,
                topic = %job.topic,
                attempt = job.attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                worker_id,
                "job failed, retrying"
            );

            // Requeue off-worker so the backoff wait does not stall the
            // pool.
            let inner = Arc::clone(inner);
            tokio::spawn(async move {
                tokio::time::sleep(backoff).await;
                if inner.tx.send(job).await.is_err() {
                    inner.in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
    }
}

fn park(inner: &Inner, job: Job, error: String) {
    inner.dead.lock().unwrap().push(DeadJob {
        job,
        error,
        failed_at: Utc::now(),
    });
    inner.in_flight.fetch_sub(1, Ordering::SeqCst);
}
