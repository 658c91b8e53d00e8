use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// One unit of deferred work. `attempt` counts completed delivery attempts;
/// a job fresh off `enqueue` has attempt 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub topic: String,
    pub payload: serde_json::Value,
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(topic: &str, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            payload,
            attempt: 0,
            enqueued_at: Utc::now(),
        }
    }
}

/// Per-topic job handler.
///
/// Delivery is at-least-once: a handler that succeeded but whose result was
/// lost may see the same job again, so implementations must be idempotent
/// or tolerate duplicates (the miles-credit handler uses an idempotency key
/// for this).
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), HandlerError>;
}

/// A job parked after exhausting its retry budget. Dead jobs are never
/// silently discarded; they stay inspectable on the dispatcher.
#[derive(Debug, Clone)]
pub struct DeadJob {
    pub job: Job,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}
