use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use skyfare_booking::PurchaseRequest;
use skyfare_core::error::BookingError;
use skyfare_core::ticket::Ticket;
use skyfare_shared::pii::Masked;
use skyfare_shared::{Passenger, PaymentMethod};
use tracing::info;
use uuid::Uuid;

use crate::auth::authenticate;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PassengerDto {
    pub first_name: String,
    pub last_name: String,
    pub passport_number: String,
    pub nationality: String,
}

impl From<PassengerDto> for Passenger {
    fn from(dto: PassengerDto) -> Self {
        Passenger {
            first_name: dto.first_name,
            last_name: dto.last_name,
            passport_number: Masked(dto.passport_number),
            nationality: dto.nationality,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BuyTicketRequest {
    pub flight_id: Uuid,
    pub passengers: Vec<PassengerDto>,
    #[serde(default = "default_payment_type")]
    pub payment_type: String,
    pub member_no: Option<String>,
    pub payment_info: Option<serde_json::Value>,
}

fn default_payment_type() -> String {
    "CARD".to_string()
}

#[derive(Debug, Serialize)]
pub struct TicketEnvelope {
    pub success: bool,
    pub message: String,
    pub data: Ticket,
}

#[derive(Debug, Serialize)]
pub struct TicketListResponse {
    pub success: bool,
    pub data: Vec<Ticket>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tickets/buy", post(buy_ticket))
        .route("/tickets", get(list_tickets))
        .route("/tickets/{id}", get(get_ticket).delete(cancel_ticket))
}

async fn buy_ticket(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(req): Json<BuyTicketRequest>,
) -> Result<(StatusCode, Json<TicketEnvelope>), AppError> {
    let user_id = authenticate(&state, bearer.token())?;

    if req.passengers.is_empty() {
        return Err(AppError::ValidationError(
            "flight id and passenger details are required".to_string(),
        ));
    }
    let payment_method: PaymentMethod = req
        .payment_type
        .parse()
        .map_err(|_| AppError::ValidationError("payment type must be CARD or MILES".to_string()))?;
    if payment_method == PaymentMethod::Miles && req.member_no.is_none() {
        return Err(AppError::ValidationError(
            "loyalty membership number is required for MILES payment".to_string(),
        ));
    }
    if payment_method == PaymentMethod::Card && req.payment_info.is_none() {
        return Err(AppError::ValidationError(
            "card details are required for CARD payment".to_string(),
        ));
    }

    let ticket = state
        .orchestrator
        .purchase(PurchaseRequest {
            user_id,
            flight_id: req.flight_id,
            passengers: req.passengers.into_iter().map(Into::into).collect(),
            payment_method,
            membership_number: req.member_no,
        })
        .await?;

    info!(ticket_id = %ticket.id, pnr = %ticket.pnr, "purchase completed");

    Ok((
        StatusCode::CREATED,
        Json(TicketEnvelope {
            success: true,
            message: "ticket purchased".to_string(),
            data: ticket,
        }),
    ))
}

async fn list_tickets(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<TicketListResponse>, AppError> {
    let user_id = authenticate(&state, bearer.token())?;

    let page = query.page.max(1);
    let page_size = query.page_size.clamp(1, 100);
    let result = state
        .tickets
        .find_by_user(user_id, page, page_size)
        .await
        .map_err(BookingError::from)?;

    let total_pages = result.total.div_ceil(page_size as u64);
    Ok(Json(TicketListResponse {
        success: true,
        data: result.tickets,
        pagination: Pagination {
            total: result.total,
            page,
            page_size,
            total_pages,
        },
    }))
}

async fn get_ticket(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<TicketEnvelope>, AppError> {
    let user_id = authenticate(&state, bearer.token())?;

    let ticket = state
        .tickets
        .find_by_id(ticket_id)
        .await
        .map_err(BookingError::from)?
        .ok_or(BookingError::TicketNotFound)?;

    if ticket.user_id != user_id {
        return Err(BookingError::NotOwner.into());
    }

    Ok(Json(TicketEnvelope {
        success: true,
        message: "ok".to_string(),
        data: ticket,
    }))
}

async fn cancel_ticket(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<TicketEnvelope>, AppError> {
    let user_id = authenticate(&state, bearer.token())?;

    let ticket = state.orchestrator.cancel(ticket_id, user_id).await?;

    Ok(Json(TicketEnvelope {
        success: true,
        message: "ticket cancelled".to_string(),
        data: ticket,
    }))
}
