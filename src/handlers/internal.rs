use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;

use super::{detached_with_deadline, parse_booking_id, DEFAULT_DEADLINE};
use crate::models::{BookingResponse, UpdateBookingStatusRequest};
use crate::services::Transition;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

/// Payment service callback.
pub async fn update_booking_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateBookingStatusRequest>,
) -> Result<Response, AppError> {
    let booking_id = parse_booking_id(&id)?;
    let transition = Transition::from_payment_outcome(&request.status, request.payment_id)?;

    let transitions = state.transitions.clone();
    let details = detached_with_deadline(DEFAULT_DEADLINE, "update booking status", async move {
        transitions.apply(booking_id, transition).await
    })
    .await?;

    tracing::info!(%booking_id, status = %request.status, payment_id = request.payment_id, "Payment outcome applied");
    Ok(success(BookingResponse::from(&details), "Booking status updated"))
}
