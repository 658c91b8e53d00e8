use axum::{extract::State, routing::get, Json, Router};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::Serialize;
use skyfare_core::error::{BookingError, LedgerError};
use skyfare_shared::Tier;

use crate::auth::authenticate;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MilesSummary {
    pub membership_number: String,
    pub total_miles: i64,
    pub available_miles: i64,
    pub tier: Tier,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/miles/me", get(my_miles))
}

async fn my_miles(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<MilesSummary>, AppError> {
    let user_id = authenticate(&state, bearer.token())?;

    // Membership is created lazily on the first earn/spend; until then the
    // user has no loyalty record and the lookup is a 404.
    let member = state
        .ledger
        .member_for_user(user_id)
        .await
        .map_err(BookingError::from)?
        .ok_or(BookingError::Ledger(LedgerError::MemberNotFound))?;

    Ok(Json(MilesSummary {
        membership_number: member.membership_number,
        total_miles: member.total_miles,
        available_miles: member.available_miles,
        tier: member.tier,
    }))
}
