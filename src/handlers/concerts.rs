use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;

use super::{detached_with_deadline, parse_concert_id, with_deadline, DEFAULT_DEADLINE};
use crate::auth::AdminUser;
use crate::models::{ConcertResponse, CreateConcertRequest};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

pub async fn list_concerts(State(state): State<AppState>) -> Result<Response, AppError> {
    let concerts = with_deadline(DEFAULT_DEADLINE, "list concerts", state.concerts.list_concerts()).await?;
    Ok(success(concerts, "Concerts retrieved"))
}

pub async fn get_concert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let concert_id = parse_concert_id(&id)?;
    let concert = with_deadline(
        DEFAULT_DEADLINE,
        "get concert",
        state.concerts.get_concert(concert_id),
    )
    .await?;
    Ok(success(concert, "Concert retrieved"))
}

pub async fn concert_seats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let concert_id = parse_concert_id(&id)?;
    let seats = with_deadline(
        DEFAULT_DEADLINE,
        "list seats",
        state.concerts.concert_seats(concert_id),
    )
    .await?;
    Ok(success(seats, "Seats retrieved"))
}

pub async fn concert_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let concert_id = parse_concert_id(&id)?;
    let availability = with_deadline(
        DEFAULT_DEADLINE,
        "concert availability",
        state.availability.concert_availability(concert_id),
    )
    .await?;
    Ok(success(availability, "Availability retrieved"))
}

pub async fn create_concert(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateConcertRequest>,
) -> Result<Response, AppError> {
    let concerts = state.concerts.clone();
    let concert = detached_with_deadline(DEFAULT_DEADLINE, "create concert", async move {
        concerts.create_concert(request).await
    })
    .await?;

    tracing::info!(concert_id = concert.concert.id, admin_id = admin.user_id, "Concert created");

    let totals: Vec<i64> = concert
        .ticket_classes
        .iter()
        .map(|tc| i64::from(tc.total_seats_in_class))
        .collect();
    Ok(created(
        ConcertResponse::new(&concert, &totals),
        "Concert created, seats are being prepared",
    ))
}
