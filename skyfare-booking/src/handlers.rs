use async_trait::async_trait;
use skyfare_loyalty::LoyaltyLedger;
use skyfare_queue::{HandlerError, Job, JobHandler};
use skyfare_shared::events::{MilesCreditJob, PurchaseNotificationJob};
use std::sync::Arc;
use tracing::info;

/// Handles `miles-credit` jobs by crediting the ledger.
///
/// The dispatcher is at-least-once, so the credit carries a deterministic
/// idempotency key derived from the ticket id; a redelivered job becomes a
/// no-op instead of a double credit.
pub struct MilesCreditHandler {
    ledger: Arc<LoyaltyLedger>,
}

impl MilesCreditHandler {
    pub fn new(ledger: Arc<LoyaltyLedger>) -> Self {
        Self { ledger }
    }
}

pub fn miles_credit_key(ticket_id: uuid::Uuid) -> String {
    format!("{}:miles-credit", ticket_id)
}

pub fn miles_refund_key(ticket_id: uuid::Uuid) -> String {
    format!("{}:miles-refund", ticket_id)
}

#[async_trait]
impl JobHandler for MilesCreditHandler {
    async fn handle(&self, job: &Job) -> Result<(), HandlerError> {
        let payload: MilesCreditJob = serde_json::from_value(job.payload.clone())?;
        let key = miles_credit_key(payload.ticket_id);

        self.ledger
            .credit(
                payload.user_id,
                payload.miles,
                &format!("ticket {} purchase", payload.ticket_id),
                Some(&key),
            )
            .await?;

        Ok(())
    }
}

/// Stand-in consumer for `purchase-notification`. The real consumer is the
/// external notification service; this sink makes delivered payloads
/// observable in dev runs and tests.
pub struct NotificationLogSink;

#[async_trait]
impl JobHandler for NotificationLogSink {
    async fn handle(&self, job: &Job) -> Result<(), HandlerError> {
        let payload: PurchaseNotificationJob = serde_json::from_value(job.payload.clone())?;
        info!(
            user_id = %payload.user_id,
            ticket_id = %payload.ticket_id,
            kind = ?payload.kind,
            flight_number = %payload.flight_number,
            passenger_count = payload.passenger_count,
            "notification dispatched"
        );
        Ok(())
    }
}
