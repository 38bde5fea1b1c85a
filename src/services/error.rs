use thiserror::Error;
use uuid::Uuid;

use crate::counter::CounterError;
use crate::models::BookingStatus;
use crate::queue::QueueError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("ticket class {ticket_class_id} has {available} seats left, {requested} requested")]
    InsufficientInventory {
        ticket_class_id: i64,
        requested: i64,
        available: i64,
    },

    #[error("ticket class {ticket_class_id} still contended after {attempts} attempts")]
    ContentionExhausted { ticket_class_id: i64, attempts: u32 },

    #[error("seat quantity must be positive, got {0}")]
    InvalidQuantity(i64),

    #[error(transparent)]
    Counter(#[from] CounterError),
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),

    #[error("a booking holds between 1 and {max} tickets, {requested} requested")]
    InvalidQuantity { requested: i64, max: i64 },

    #[error("user already has an active booking for concert {concert_id}")]
    DuplicateActiveBooking { concert_id: i64 },

    #[error("concert {0} not found")]
    ConcertNotFound(i64),

    #[error("concert {0} is not open for booking")]
    ConcertNotActive(i64),

    #[error("ticket class {0} does not belong to this concert")]
    ClassNotFound(i64),

    #[error("not enough seats left in ticket class {ticket_class_id}")]
    InsufficientInventory { ticket_class_id: i64 },

    #[error("ticket class {ticket_class_id} is busy, please retry")]
    ContentionExhausted { ticket_class_id: i64 },

    #[error("booking {0} not found")]
    BookingNotFound(Uuid),

    #[error("booking {booking_id} is {status} and cannot change")]
    InvalidTransition {
        booking_id: Uuid,
        status: BookingStatus,
    },

    #[error("booking does not belong to the caller")]
    Unauthorized,

    #[error("booking transaction failed: {0}")]
    Transaction(#[source] StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Counter(#[from] CounterError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl From<ReservationError> for BookingError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::InsufficientInventory {
                ticket_class_id, ..
            } => BookingError::InsufficientInventory { ticket_class_id },
            ReservationError::ContentionExhausted {
                ticket_class_id, ..
            } => BookingError::ContentionExhausted { ticket_class_id },
            ReservationError::InvalidQuantity(n) => BookingError::InvalidQuantity {
                requested: n,
                max: super::booking::MAX_TICKETS_PER_BOOKING,
            },
            ReservationError::Counter(e) => BookingError::Counter(e),
        }
    }
}
