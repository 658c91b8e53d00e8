use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use skyfare_core::inventory::{FlightInventory, FlightSnapshot, InventoryError};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// HTTP client for the external flight/inventory service.
///
/// The service owns the seat counts; this client only reads snapshots and
/// requests deltas. Every request carries a bounded timeout and failures are
/// surfaced unretried.
pub struct HttpFlightInventory {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlightDto {
    id: Uuid,
    flight_number: String,
    available_seats: i32,
    calculated_price: Option<f64>,
    base_price: Option<f64>,
    cabin: Option<String>,
    distance: Option<f64>,
}

/// Fare applied when the service reports no usable price; a fare of zero
/// would trip the ticket's positive-price invariant after settlement.
const DEFAULT_FARE: i64 = 5000;

impl From<FlightDto> for FlightSnapshot {
    fn from(dto: FlightDto) -> Self {
        // Computed price wins over base price; missing or non-positive
        // prices fall through to the default fare, fractional fares floor
        // to whole currency units.
        let unit_price = dto
            .calculated_price
            .filter(|p| *p > 0.0)
            .or(dto.base_price.filter(|p| *p > 0.0))
            .map(|p| p.floor() as i64)
            .unwrap_or(DEFAULT_FARE);

        FlightSnapshot {
            id: dto.id,
            flight_number: dto.flight_number,
            available_seats: dto.available_seats,
            unit_price,
            cabin: dto.cabin,
            distance_km: dto.distance,
        }
    }
}

fn map_reqwest(err: reqwest::Error) -> InventoryError {
    if err.is_timeout() {
        InventoryError::Timeout
    } else {
        InventoryError::Upstream(err.to_string())
    }
}

impl HttpFlightInventory {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, InventoryError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| InventoryError::Upstream(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FlightInventory for HttpFlightInventory {
    async fn get_flight(&self, flight_id: Uuid) -> Result<Option<FlightSnapshot>, InventoryError> {
        let url = format!("{}/flights/{}", self.base_url, flight_id);
        let response = self.client.get(&url).send().await.map_err(map_reqwest)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response.error_for_status().map_err(map_reqwest)?;
        let envelope: ApiEnvelope<FlightDto> = response.json().await.map_err(map_reqwest)?;
        Ok(Some(envelope.data.into()))
    }

    async fn adjust_seats(&self, flight_id: Uuid, delta: i32) -> Result<(), InventoryError> {
        let url = format!("{}/flights/{}/seats", self.base_url, flight_id);
        self.client
            .patch(&url)
            .json(&serde_json::json!({ "seats": delta }))
            .send()
            .await
            .map_err(map_reqwest)?
            .error_for_status()
            .map_err(map_reqwest)?;

        info!(%flight_id, delta, "seat adjustment requested");
        Ok(())
    }

    async fn search_by_date(&self, date: NaiveDate) -> Result<Vec<FlightSnapshot>, InventoryError> {
        let url = format!("{}/flights/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .send()
            .await
            .map_err(map_reqwest)?
            .error_for_status()
            .map_err(map_reqwest)?;

        let envelope: ApiEnvelope<Vec<FlightDto>> = response.json().await.map_err(map_reqwest)?;
        Ok(envelope.data.into_iter().map(Into::into).collect())
    }
}
