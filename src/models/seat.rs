use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    Available,
    Reserved,
    Booked,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Reserved => "reserved",
            SeatStatus::Booked => "booked",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for SeatStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "available" => Ok(SeatStatus::Available),
            "reserved" => Ok(SeatStatus::Reserved),
            "booked" => Ok(SeatStatus::Booked),
            other => Err(format!("unknown seat status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Seat {
    pub id: i64,
    pub concert_id: i64,
    pub ticket_class_id: i64,
    pub seat_number: String,
    #[sqlx(try_from = "String")]
    pub status: SeatStatus,
    pub user_id: Option<i64>,
    pub booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Seat row produced by bulk materialization, before it has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSeat {
    pub concert_id: i64,
    pub ticket_class_id: i64,
    pub seat_number: String,
}

/// Number of a seat created by the background materialization worker.
pub fn materialized_seat_number(class_name: &str, ordinal: i32) -> String {
    format!("{class_name}-S{ordinal}")
}

/// Number of a seat synthesized while booking, when no materialized seat is free.
///
/// The booking id is globally unique and the ordinal is unique within the
/// booking, so the result can never collide with another booking's seats or
/// with a materialized `{class}-S{n}` number.
pub fn synthetic_seat_number(class_name: &str, booking_id: Uuid, ordinal: usize) -> String {
    format!("{class_name}-{}-{ordinal}", booking_id.simple())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatResponse {
    pub id: i64,
    pub seat_number: String,
    pub status: SeatStatus,
    pub ticket_class_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_class_name: Option<String>,
}

impl From<&Seat> for SeatResponse {
    fn from(seat: &Seat) -> Self {
        Self {
            id: seat.id,
            seat_number: seat.seat_number.clone(),
            status: seat.status,
            ticket_class_id: seat.ticket_class_id,
            ticket_class_name: None,
        }
    }
}
