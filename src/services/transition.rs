//! Booking status state machine.
//!
//! Only pending bookings move. A confirmation keeps the seats with the
//! booking; every other outcome frees them, first in the durable store and
//! then in the counter store.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::error::BookingError;
use super::reservation::ReservationEngine;
use crate::models::{BookingDetails, BookingStatus, SeatStatus};
use crate::store::{BookingStore, TransitionUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Confirm { payment_id: i64 },
    Fail { payment_id: i64 },
    /// `user_id` is the caller for user cancellations, `None` when the
    /// payment service cancels.
    Cancel { user_id: Option<i64> },
    Expire,
}

impl Transition {
    /// Maps a payment service callback onto a transition.
    pub fn from_payment_outcome(status: &str, payment_id: i64) -> Result<Self, BookingError> {
        match status {
            "confirmed" => Ok(Transition::Confirm { payment_id }),
            "failed" => Ok(Transition::Fail { payment_id }),
            "cancelled" => Ok(Transition::Cancel { user_id: None }),
            other => Err(BookingError::Validation(format!(
                "status must be one of confirmed, failed, cancelled; got '{other}'"
            ))),
        }
    }

    pub fn target(&self) -> BookingStatus {
        match self {
            Transition::Confirm { .. } => BookingStatus::Confirmed,
            Transition::Fail { .. } => BookingStatus::Failed,
            Transition::Cancel { .. } | Transition::Expire => BookingStatus::Cancelled,
        }
    }

    fn releases_seats(&self) -> bool {
        !matches!(self, Transition::Confirm { .. })
    }
}

#[derive(Clone)]
pub struct TransitionService {
    store: Arc<dyn BookingStore>,
    reservations: ReservationEngine,
}

impl TransitionService {
    pub fn new(store: Arc<dyn BookingStore>, reservations: ReservationEngine) -> Self {
        Self {
            store,
            reservations,
        }
    }

    pub async fn apply(
        &self,
        booking_id: Uuid,
        transition: Transition,
    ) -> Result<BookingDetails, BookingError> {
        let mut details = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        if let Transition::Cancel {
            user_id: Some(caller),
        } = transition
        {
            if caller != details.booking.user_id {
                return Err(BookingError::Unauthorized);
            }
        }

        let current = details.booking.status;
        if current != BookingStatus::Pending {
            return Err(BookingError::InvalidTransition {
                booking_id,
                status: current,
            });
        }

        let per_class = details.seats_per_class();
        let update = match transition {
            Transition::Confirm { payment_id } => TransitionUpdate {
                booking_id,
                status: BookingStatus::Confirmed,
                payment_id: Some(payment_id),
                seat_status: SeatStatus::Booked,
                restored: Vec::new(),
            },
            Transition::Fail { .. } | Transition::Cancel { .. } | Transition::Expire => {
                TransitionUpdate {
                    booking_id,
                    status: transition.target(),
                    payment_id: None,
                    seat_status: SeatStatus::Available,
                    restored: per_class.clone(),
                }
            }
        };

        self.store.apply_transition(update.clone()).await?;

        if transition.releases_seats() {
            for (ticket_class_id, quantity) in &per_class {
                self.reservations
                    .release_logged(*ticket_class_id, *quantity)
                    .await;
            }
        }

        info!(
            %booking_id,
            from = %current,
            to = %transition.target(),
            seats = details.seats.len(),
            "Booking transitioned"
        );

        // The transition is committed; a failed re-read must not report it as failed.
        match self.store.get_booking(booking_id).await {
            Ok(Some(fresh)) => Ok(fresh),
            Ok(None) => {
                warn!(%booking_id, "Booking vanished after transition, returning local view");
                settle_locally(&mut details, &update);
                Ok(details)
            }
            Err(e) => {
                warn!(%booking_id, error = %e, "Re-read after transition failed, returning local view");
                settle_locally(&mut details, &update);
                Ok(details)
            }
        }
    }
}

/// Applies a committed transition to a booking read before it.
fn settle_locally(details: &mut BookingDetails, update: &TransitionUpdate) {
    details.booking.status = update.status;
    if update.payment_id.is_some() {
        details.booking.payment_id = update.payment_id;
    }
    details.booking.expires_at = None;
    for seat in &mut details.seats {
        seat.status = update.seat_status;
        if update.seat_status == SeatStatus::Available {
            seat.user_id = None;
            seat.booking_id = None;
        }
    }
}
