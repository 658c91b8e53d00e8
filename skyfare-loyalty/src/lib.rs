pub mod ledger;
pub mod miles;

pub use ledger::LoyaltyLedger;
pub use miles::calculate_flight_miles;
