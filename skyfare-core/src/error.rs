use crate::inventory::InventoryError;
use crate::payment::PaymentError;
use crate::repository::RepositoryError;

/// Loyalty-ledger failure taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("mile amount must be positive")]
    InvalidAmount,

    #[error("loyalty membership not found")]
    MemberNotFound,

    #[error("insufficient miles: required {required}, available {available}")]
    InsufficientMiles { required: i64, available: i64 },

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Everything the purchase/cancel saga can surface to a caller. Variants
/// before `Persist` carry a zero-side-effect guarantee; failures after the
/// ticket is written are logged, not returned.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("flight not found")]
    FlightNotFound,

    #[error("insufficient capacity: requested {requested}, available {available}")]
    InsufficientCapacity { requested: u32, available: i32 },

    #[error("loyalty membership number required for MILES payment")]
    MissingMemberNumber,

    #[error("insufficient miles: required {required}, available {available}")]
    InsufficientMiles { required: i64, available: i64 },

    #[error("payment declined")]
    PaymentDeclined,

    #[error("ticket not found")]
    TicketNotFound,

    #[error("ticket belongs to another user")]
    NotOwner,

    #[error("ticket already cancelled")]
    AlreadyCancelled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error(transparent)]
    Ledger(LedgerError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Store(#[from] RepositoryError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<LedgerError> for BookingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::MemberNotFound => BookingError::Ledger(LedgerError::MemberNotFound),
            LedgerError::InsufficientMiles { required, available } => {
                BookingError::InsufficientMiles { required, available }
            }
            other => BookingError::Ledger(other),
        }
    }
}

impl From<PaymentError> for BookingError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Declined => BookingError::PaymentDeclined,
            PaymentError::Unavailable(msg) => BookingError::Internal(msg),
        }
    }
}
