//! Booking creation saga and booking reads.
//!
//! Creating a booking reserves counter capacity first and only then writes the
//! durable records. Every step that fails after a reservation hands the
//! reserved seats back before the error is returned.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::error::BookingError;
use super::payment::{PaymentNotifier, PaymentRequest};
use super::reservation::ReservationEngine;
use crate::models::{BookingDetails, ConcertStatus, CreateBookingRequest};
use crate::store::{BookingStore, NewBooking, SeatAllocation};

pub const MAX_TICKETS_PER_BOOKING: i64 = 5;

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    reservations: ReservationEngine,
    notifier: Arc<dyn PaymentNotifier>,
    booking_ttl: Duration,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        reservations: ReservationEngine,
        notifier: Arc<dyn PaymentNotifier>,
        booking_ttl: Duration,
    ) -> Self {
        Self {
            store,
            reservations,
            notifier,
            booking_ttl,
        }
    }

    pub async fn create_booking(
        &self,
        user_id: i64,
        request: CreateBookingRequest,
    ) -> Result<BookingDetails, BookingError> {
        let requested = request.total_tickets();
        if !(1..=MAX_TICKETS_PER_BOOKING).contains(&requested) {
            return Err(BookingError::InvalidQuantity {
                requested,
                max: MAX_TICKETS_PER_BOOKING,
            });
        }
        request.validate().map_err(BookingError::Validation)?;

        let concert_id = request.concert_id;
        if !self
            .store
            .find_active_bookings(user_id, concert_id)
            .await?
            .is_empty()
        {
            return Err(BookingError::DuplicateActiveBooking { concert_id });
        }

        let concert = self
            .store
            .get_concert(concert_id)
            .await?
            .ok_or(BookingError::ConcertNotFound(concert_id))?;
        if concert.concert.status != ConcertStatus::Active {
            return Err(BookingError::ConcertNotActive(concert_id));
        }

        let mut allocations = Vec::new();
        let mut total_price = Decimal::ZERO;
        for (ticket_class_id, quantity) in request.quantities_by_class() {
            let class = concert
                .ticket_class(ticket_class_id)
                .ok_or(BookingError::ClassNotFound(ticket_class_id))?;
            total_price += class.price * Decimal::from(quantity);
            allocations.push(SeatAllocation {
                ticket_class_id,
                class_name: class.name.clone(),
                quantity,
            });
        }

        let mut reserved: Vec<(i64, i64)> = Vec::with_capacity(allocations.len());
        for alloc in &allocations {
            let quantity = i64::from(alloc.quantity);
            if let Err(e) = self
                .reservations
                .reserve(alloc.ticket_class_id, quantity)
                .await
            {
                warn!(
                    user_id,
                    concert_id,
                    ticket_class_id = alloc.ticket_class_id,
                    error = %e,
                    "Reservation failed, releasing earlier classes"
                );
                self.release_all(&reserved).await;
                return Err(e.into());
            }
            reserved.push((alloc.ticket_class_id, quantity));
        }

        let booking_id = Uuid::new_v4();
        let new_booking = NewBooking {
            id: booking_id,
            user_id,
            concert_id,
            total_price,
            expires_at: Utc::now() + self.booking_ttl,
            allocations,
            buyer: request.buyer_info,
            ticket_holder: request.ticket_holder_info,
        };

        let details = match self.store.create_booking(new_booking).await {
            Ok(details) => details,
            Err(e) => {
                error!(%booking_id, user_id, concert_id, error = %e, "Booking transaction failed, releasing seats");
                self.release_all(&reserved).await;
                return Err(BookingError::Transaction(e));
            }
        };

        info!(
            %booking_id,
            user_id,
            concert_id,
            seats = details.seats.len(),
            total_price = %total_price,
            "Booking created"
        );

        self.notify_payment(PaymentRequest::new(booking_id, total_price));
        Ok(details)
    }

    pub async fn get_booking(
        &self,
        booking_id: Uuid,
        user_id: i64,
    ) -> Result<BookingDetails, BookingError> {
        let details = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;
        if details.booking.user_id != user_id {
            return Err(BookingError::Unauthorized);
        }
        Ok(details)
    }

    pub async fn list_user_bookings(&self, user_id: i64) -> Result<Vec<BookingDetails>, BookingError> {
        Ok(self.store.list_user_bookings(user_id).await?)
    }

    async fn release_all(&self, reserved: &[(i64, i64)]) {
        for (ticket_class_id, quantity) in reserved {
            self.reservations
                .release_logged(*ticket_class_id, *quantity)
                .await;
        }
    }

    fn notify_payment(&self, request: PaymentRequest) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let booking_id = request.booking_id;
            match notifier.notify(request).await {
                Ok(()) => info!(%booking_id, "Payment service notified"),
                Err(e) => warn!(%booking_id, error = %e, "Payment notification failed"),
            }
        });
    }
}
