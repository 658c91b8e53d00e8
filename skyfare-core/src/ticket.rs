use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skyfare_shared::{Passenger, PaymentMethod, TicketStatus};
use uuid::Uuid;

/// Passenger Name Record: the 6-character uppercase-alphanumeric booking
/// reference, unique across all tickets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Pnr(String);

impl Pnr {
    pub const LEN: usize = 6;

    /// Accepts exactly six characters from [A-Z0-9].
    pub fn parse(s: &str) -> Result<Self, InvalidPnr> {
        if s.len() != Self::LEN || !s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
            return Err(InvalidPnr(s.to_string()));
        }
        Ok(Pnr(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Pnr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid PNR: {0}")]
pub struct InvalidPnr(String);

/// One confirmed (or cancelled) purchase. The single source of truth for
/// what the traveler bought and how it was settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub pnr: Pnr,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub passengers: Vec<Passenger>,
    /// Whole currency units.
    pub total_price: i64,
    pub payment_method: PaymentMethod,
    pub miles_used: i64,
    pub miles_earned: i64,
    pub membership_number: Option<String>,
    /// Opaque settlement reference from the payment step.
    pub payment_reference: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Builds a confirmed ticket, enforcing the settlement invariants:
    /// miles_used > 0 only on MILES tickets, miles_earned > 0 only on CARD
    /// tickets, and a non-empty passenger list.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pnr: Pnr,
        user_id: Uuid,
        flight_id: Uuid,
        passengers: Vec<Passenger>,
        total_price: i64,
        payment_method: PaymentMethod,
        miles_used: i64,
        miles_earned: i64,
        membership_number: Option<String>,
        payment_reference: String,
    ) -> Result<Self, TicketInvariant> {
        if passengers.is_empty() {
            return Err(TicketInvariant::NoPassengers);
        }
        if total_price <= 0 {
            return Err(TicketInvariant::NonPositivePrice(total_price));
        }
        if miles_used > 0 && payment_method != PaymentMethod::Miles {
            return Err(TicketInvariant::MilesUsedOnCardTicket);
        }
        if miles_earned > 0 && payment_method != PaymentMethod::Card {
            return Err(TicketInvariant::MilesEarnedOnMilesTicket);
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            pnr,
            user_id,
            flight_id,
            passengers,
            total_price,
            payment_method,
            miles_used,
            miles_earned,
            membership_number,
            payment_reference,
            status: TicketStatus::Confirmed,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn passenger_count(&self) -> u32 {
        self.passengers.len() as u32
    }

    pub fn update_status(&mut self, new_status: TicketStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TicketInvariant {
    #[error("ticket requires at least one passenger")]
    NoPassengers,

    #[error("ticket price must be positive, got {0}")]
    NonPositivePrice(i64),

    #[error("miles_used > 0 requires MILES payment")]
    MilesUsedOnCardTicket,

    #[error("miles_earned > 0 requires CARD payment")]
    MilesEarnedOnMilesTicket,
}
