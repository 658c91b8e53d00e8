pub mod error;
pub mod inventory;
pub mod member;
pub mod payment;
pub mod repository;
pub mod ticket;

pub use error::{BookingError, LedgerError};
pub use inventory::{FlightInventory, FlightSnapshot};
pub use member::LoyaltyMember;
pub use payment::{PaymentAdapter, PaymentResult, RefundResult};
pub use repository::{MemberRepository, RepositoryError, TicketRepository};
pub use ticket::{Pnr, Ticket};
