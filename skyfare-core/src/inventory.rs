use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-in-time view of a flight as served by the external inventory
/// service. Seat count here is advisory: the service owns it, and the value
/// may be stale by the time a purchase settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightSnapshot {
    pub id: Uuid,
    pub flight_number: String,
    pub available_seats: i32,
    /// Whole currency units per passenger; the service's computed price when
    /// present, otherwise its base price.
    pub unit_price: i64,
    pub cabin: Option<String>,
    pub distance_km: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("inventory service error: {0}")]
    Upstream(String),

    #[error("inventory request timed out")]
    Timeout,
}

/// Thin client over the external flight/inventory service. Failures are
/// surfaced to the caller; no internal retries.
#[async_trait]
pub trait FlightInventory: Send + Sync {
    /// Fetch a flight by id. `Ok(None)` when the service reports 404.
    async fn get_flight(&self, flight_id: Uuid) -> Result<Option<FlightSnapshot>, InventoryError>;

    /// Apply a seat delta: negative on purchase, positive on cancellation.
    async fn adjust_seats(&self, flight_id: Uuid, delta: i32) -> Result<(), InventoryError>;

    /// Flights departing on a given date. Used by downstream batch jobs.
    async fn search_by_date(&self, date: NaiveDate) -> Result<Vec<FlightSnapshot>, InventoryError>;
}
