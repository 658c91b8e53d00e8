pub mod models;
pub mod events;
pub mod pii;

pub use models::{CabinClass, PaymentMethod, Passenger, TicketStatus, Tier};
