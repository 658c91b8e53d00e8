use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use skyfare_core::error::{BookingError, LedgerError};

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    ValidationError(String),
    Booking(BookingError),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Booking(err) => {
                let status = match &err {
                    BookingError::FlightNotFound
                    | BookingError::TicketNotFound
                    | BookingError::Ledger(LedgerError::MemberNotFound) => StatusCode::NOT_FOUND,
                    // Conflicts: the caller can retry with different
                    // parameters.
                    BookingError::InsufficientCapacity { .. }
                    | BookingError::InsufficientMiles { .. }
                    | BookingError::AlreadyCancelled => StatusCode::CONFLICT,
                    BookingError::MissingMemberNumber | BookingError::InvalidRequest(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    BookingError::PaymentDeclined => StatusCode::PAYMENT_REQUIRED,
                    BookingError::NotOwner => StatusCode::FORBIDDEN,
                    BookingError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    BookingError::Ledger(_)
                    | BookingError::Inventory(_)
                    | BookingError::Store(_)
                    | BookingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Internal Server Error: {}", err);
                    (status, "Internal Server Error".to_string())
                } else {
                    (status, err.to_string())
                }
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        AppError::Booking(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Anyhow(err)
    }
}
