use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;

use super::{
    detached_with_deadline, parse_booking_id, with_deadline, CREATE_BOOKING_DEADLINE,
    DEFAULT_DEADLINE,
};
use crate::auth::AuthUser;
use crate::models::{BookingResponse, CreateBookingRequest};
use crate::services::Transition;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Response, AppError> {
    let bookings = state.bookings.clone();
    let details = detached_with_deadline(CREATE_BOOKING_DEADLINE, "create booking", async move {
        bookings.create_booking(user.user_id, request).await
    })
    .await?;

    Ok(created(
        BookingResponse::from(&details),
        "Booking created, awaiting payment",
    ))
}

pub async fn my_bookings(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    let bookings = with_deadline(
        DEFAULT_DEADLINE,
        "list bookings",
        state.bookings.list_user_bookings(user.user_id),
    )
    .await?;

    let body: Vec<BookingResponse> = bookings.iter().map(BookingResponse::from).collect();
    Ok(success(body, "Bookings retrieved"))
}

pub async fn get_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let booking_id = parse_booking_id(&id)?;
    let details = with_deadline(
        DEFAULT_DEADLINE,
        "get booking",
        state.bookings.get_booking(booking_id, user.user_id),
    )
    .await?;

    Ok(success(BookingResponse::from(&details), "Booking retrieved"))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let booking_id = parse_booking_id(&id)?;
    let transitions = state.transitions.clone();
    let cancel = Transition::Cancel {
        user_id: Some(user.user_id),
    };
    let details = detached_with_deadline(DEFAULT_DEADLINE, "cancel booking", async move {
        transitions.apply(booking_id, cancel).await
    })
    .await?;

    Ok(success(BookingResponse::from(&details), "Booking cancelled"))
}
