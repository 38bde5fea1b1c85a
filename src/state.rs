use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;

use crate::auth::JwtVerifier;
use crate::counter::CounterStore;
use crate::queue::SeatQueue;
use crate::rate_limit::RateLimit;
use crate::services::{
    AvailabilityService, BookingService, ConcertService, ExpiryReaper, PaymentNotifier,
    ReservationEngine, TransitionService,
};
use crate::store::BookingStore;

/// Shared handles for request handlers and background tasks.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookingStore>,
    pub bookings: BookingService,
    pub transitions: TransitionService,
    pub availability: AvailabilityService,
    pub concerts: ConcertService,
    pub jwt: JwtVerifier,
    /// `None` leaves the API unthrottled.
    pub rate_limit: Option<RateLimit>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BookingStore>,
        counters: Arc<dyn CounterStore>,
        queue: Arc<dyn SeatQueue>,
        notifier: Arc<dyn PaymentNotifier>,
        jwt: JwtVerifier,
        booking_ttl: Duration,
    ) -> Self {
        let reservations = ReservationEngine::new(Arc::clone(&counters));
        let availability = AvailabilityService::new(Arc::clone(&counters), Arc::clone(&store));
        let booking_ttl =
            chrono::Duration::from_std(booking_ttl).unwrap_or_else(|_| chrono::Duration::minutes(15));

        Self {
            bookings: BookingService::new(
                Arc::clone(&store),
                reservations.clone(),
                notifier,
                booking_ttl,
            ),
            transitions: TransitionService::new(Arc::clone(&store), reservations),
            concerts: ConcertService::new(
                Arc::clone(&store),
                counters,
                queue,
                availability.clone(),
            ),
            availability,
            store,
            jwt,
            rate_limit: None,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn reaper(&self, interval: Duration) -> ExpiryReaper {
        ExpiryReaper::new(Arc::clone(&self.store), self.transitions.clone(), interval)
    }
}

impl FromRef<AppState> for JwtVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}
