//! Durable catalog and booking store.
//!
//! Every method that changes more than one row runs as a single transaction:
//! either all of its writes land or none do.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Booking, BookingDetails, BookingStatus, BuyerRequest, ConcertStatus, ConcertWithClasses,
    CreateConcertRequest, NewSeat, Seat, SeatStatus, TicketHolderRequest,
};

mod memory;
mod postgres;

pub use memory::{FailPoint, MemoryBookingStore};
pub use postgres::PgBookingStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Seats a booking takes from one ticket class.
#[derive(Debug, Clone)]
pub struct SeatAllocation {
    pub ticket_class_id: i64,
    pub class_name: String,
    pub quantity: i32,
}

/// Everything written by the booking transaction.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub id: Uuid,
    pub user_id: i64,
    pub concert_id: i64,
    pub total_price: Decimal,
    pub expires_at: DateTime<Utc>,
    pub allocations: Vec<SeatAllocation>,
    pub buyer: BuyerRequest,
    pub ticket_holder: Option<TicketHolderRequest>,
}

/// Outcome of a status transition, persisted in one transaction.
#[derive(Debug, Clone)]
pub struct TransitionUpdate {
    pub booking_id: Uuid,
    pub status: BookingStatus,
    pub payment_id: Option<i64>,
    /// `Booked` keeps seats with the booking; `Available` detaches them.
    pub seat_status: SeatStatus,
    /// Seats handed back to each class's durable mirror.
    pub restored: Vec<(i64, i64)>,
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Pending or confirmed bookings of `user_id` for `concert_id`.
    async fn find_active_bookings(
        &self,
        user_id: i64,
        concert_id: i64,
    ) -> Result<Vec<Booking>, StoreError>;

    /// Inserts the booking, claims or synthesizes its seats, stores buyer and
    /// holder, and decrements the class mirrors.
    async fn create_booking(&self, booking: NewBooking) -> Result<BookingDetails, StoreError>;

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<BookingDetails>, StoreError>;

    /// All bookings of a user, newest first.
    async fn list_user_bookings(&self, user_id: i64) -> Result<Vec<BookingDetails>, StoreError>;

    async fn apply_transition(&self, update: TransitionUpdate) -> Result<(), StoreError>;

    /// Ids of pending bookings whose expiry is strictly before `now`.
    async fn expired_pending_bookings(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError>;

    async fn count_available_seats(&self, ticket_class_id: i64) -> Result<i64, StoreError>;

    async fn get_concert(&self, concert_id: i64) -> Result<Option<ConcertWithClasses>, StoreError>;

    async fn list_concerts(&self) -> Result<Vec<ConcertWithClasses>, StoreError>;

    async fn concerts_by_status(
        &self,
        status: ConcertStatus,
    ) -> Result<Vec<ConcertWithClasses>, StoreError>;

    async fn list_concert_seats(&self, concert_id: i64) -> Result<Vec<Seat>, StoreError>;

    /// Inserts a concert in `pending_seat_creation` with its classes fully available.
    async fn create_concert(
        &self,
        request: &CreateConcertRequest,
    ) -> Result<ConcertWithClasses, StoreError>;

    /// Inserts materialized seats, resets class mirrors to their totals and
    /// marks the concert active.
    async fn materialize_seats(&self, concert_id: i64, seats: Vec<NewSeat>)
        -> Result<(), StoreError>;

    async fn set_concert_status(
        &self,
        concert_id: i64,
        status: ConcertStatus,
    ) -> Result<(), StoreError>;
}
