use serde::{Deserialize, Serialize};

use crate::pii::Masked;

/// How a ticket was settled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    Miles,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Card => write!(f, "CARD"),
            PaymentMethod::Miles => write!(f, "MILES"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CARD" => Ok(PaymentMethod::Card),
            "MILES" => Ok(PaymentMethod::Miles),
            other => Err(format!("unknown payment method: {}", other)),
        }
    }
}

/// Ticket lifecycle status. Tickets are never deleted; cancellation is a
/// status transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Confirmed,
    Cancelled,
    Refunded,
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketStatus::Confirmed => write!(f, "confirmed"),
            TicketStatus::Cancelled => write!(f, "cancelled"),
            TicketStatus::Refunded => write!(f, "refunded"),
        }
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(TicketStatus::Confirmed),
            "cancelled" => Ok(TicketStatus::Cancelled),
            "refunded" => Ok(TicketStatus::Refunded),
            other => Err(format!("unknown ticket status: {}", other)),
        }
    }
}

/// Loyalty membership level, a pure function of cumulative miles earned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Classic,
    Elite,
    ElitePlus,
}

impl Tier {
    pub fn from_total_miles(total_miles: i64) -> Self {
        if total_miles >= 40_000 {
            Tier::ElitePlus
        } else if total_miles >= 25_000 {
            Tier::Elite
        } else {
            Tier::Classic
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Classic => write!(f, "classic"),
            Tier::Elite => write!(f, "elite"),
            Tier::ElitePlus => write!(f, "elite-plus"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(Tier::Classic),
            "elite" => Ok(Tier::Elite),
            "elite-plus" => Ok(Tier::ElitePlus),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

/// Cabin class hint from the inventory service; drives mile accrual rates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CabinClass {
    Economy,
    Business,
    First,
}

impl CabinClass {
    /// Unknown/missing cabin strings fall back to economy rates.
    pub fn parse_or_economy(s: Option<&str>) -> Self {
        match s {
            Some("business") => CabinClass::Business,
            Some("first") => CabinClass::First,
            _ => CabinClass::Economy,
        }
    }
}

/// Passenger value object embedded in a ticket. No independent identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub first_name: String,
    pub last_name: String,
    pub passport_number: Masked<String>,
    pub nationality: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(Tier::from_total_miles(0), Tier::Classic);
        assert_eq!(Tier::from_total_miles(24_999), Tier::Classic);
        assert_eq!(Tier::from_total_miles(25_000), Tier::Elite);
        assert_eq!(Tier::from_total_miles(39_999), Tier::Elite);
        assert_eq!(Tier::from_total_miles(40_000), Tier::ElitePlus);
    }

    #[test]
    fn test_payment_method_roundtrip() {
        assert_eq!("CARD".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert_eq!(PaymentMethod::Miles.to_string(), "MILES");
        assert!("CASH".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_unknown_cabin_defaults_to_economy() {
        assert_eq!(CabinClass::parse_or_economy(Some("premium")), CabinClass::Economy);
        assert_eq!(CabinClass::parse_or_economy(None), CabinClass::Economy);
        assert_eq!(CabinClass::parse_or_economy(Some("first")), CabinClass::First);
    }
}
