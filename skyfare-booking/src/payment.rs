use async_trait::async_trait;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use skyfare_core::payment::{PaymentAdapter, PaymentError, PaymentResult, RefundResult};
use std::time::Duration;
use tracing::info;

/// Simulated external payment processor: fixed latency, probabilistic
/// authorization (0.95 in production config), unique settlement references.
/// Refunds always succeed. Documents the contract a real provider adapter
/// must satisfy; nothing more.
pub struct StubPaymentAdapter {
    success_rate: f64,
    latency: Duration,
}

impl StubPaymentAdapter {
    pub fn new(success_rate: f64, latency: Duration) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
            latency,
        }
    }
}

fn reference_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

#[async_trait]
impl PaymentAdapter for StubPaymentAdapter {
    async fn authorize(&self, amount: i64) -> Result<PaymentResult, PaymentError> {
        tokio::time::sleep(self.latency).await;

        let authorized = rand::thread_rng().gen_bool(self.success_rate);
        if !authorized {
            return Err(PaymentError::Declined);
        }

        let reference = format!("TXN-{}-{}", Utc::now().timestamp_millis(), reference_suffix());
        info!(%reference, amount, "payment authorized");

        Ok(PaymentResult {
            reference,
            amount,
            processed_at: Utc::now(),
        })
    }

    async fn refund(&self, reference: &str, amount: i64) -> Result<RefundResult, PaymentError> {
        tokio::time::sleep(self.latency / 2).await;

        Ok(RefundResult {
            refund_id: format!("RFD-{}", Utc::now().timestamp_millis()),
            reference: reference.to_string(),
            amount,
            processed_at: Utc::now(),
        })
    }
}
