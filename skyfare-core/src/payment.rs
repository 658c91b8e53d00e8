use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Successful authorization result. The reference is the opaque settlement
/// id stored on the ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub reference: String,
    pub amount: i64,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResult {
    pub refund_id: String,
    pub reference: String,
    pub amount: i64,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment declined")]
    Declined,

    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}

/// External payment processor contract. The in-tree implementation is a
/// stub; a real provider adapter must satisfy the same surface.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Authorize a charge for `amount` whole currency units.
    async fn authorize(&self, amount: i64) -> Result<PaymentResult, PaymentError>;

    /// Refund a previously settled charge.
    async fn refund(&self, reference: &str, amount: i64) -> Result<RefundResult, PaymentError>;
}
