//! Availability reads: counter store first, durable seat count as fallback.

use std::sync::Arc;

use tracing::{debug, warn};

use super::error::BookingError;
use crate::counter::CounterStore;
use crate::models::{AvailabilitySource, ClassAvailability, ConcertAvailability, ConcertWithClasses};
use crate::store::BookingStore;

#[derive(Clone)]
pub struct AvailabilityService {
    counters: Arc<dyn CounterStore>,
    store: Arc<dyn BookingStore>,
}

impl AvailabilityService {
    pub fn new(counters: Arc<dyn CounterStore>, store: Arc<dyn BookingStore>) -> Self {
        Self { counters, store }
    }

    /// Available seats of one class. On a counter miss or error the durable
    /// count is returned and written back to the counter store.
    pub async fn class_available(
        &self,
        ticket_class_id: i64,
    ) -> Result<(i64, AvailabilitySource), BookingError> {
        match self.counters.get(ticket_class_id).await {
            Ok(Some(available)) => return Ok((available, AvailabilitySource::Cache)),
            Ok(None) => debug!(ticket_class_id, "Availability counter missing"),
            Err(e) => warn!(ticket_class_id, error = %e, "Availability counter unreadable"),
        }

        let available = self.store.count_available_seats(ticket_class_id).await?;
        if let Err(e) = self.counters.set(ticket_class_id, available).await {
            warn!(ticket_class_id, error = %e, "Failed to repopulate availability counter");
        }
        Ok((available, AvailabilitySource::Database))
    }

    pub async fn concert_availability(
        &self,
        concert_id: i64,
    ) -> Result<ConcertAvailability, BookingError> {
        let concert = self
            .store
            .get_concert(concert_id)
            .await?
            .ok_or(BookingError::ConcertNotFound(concert_id))?;

        let mut ticket_classes = Vec::with_capacity(concert.ticket_classes.len());
        for tc in &concert.ticket_classes {
            let (available_seats, source) = self.class_available(tc.id).await?;
            ticket_classes.push(ClassAvailability {
                ticket_class_id: tc.id,
                name: tc.name.clone(),
                available_seats,
                source,
            });
        }

        Ok(ConcertAvailability {
            concert_id,
            total_available_seats: ticket_classes.iter().map(|c| c.available_seats).sum(),
            ticket_classes,
        })
    }

    /// Per-class availability for catalog views, in class order. A class whose
    /// lookup fails falls back to its durable mirror.
    pub async fn for_catalog(&self, concert: &ConcertWithClasses) -> Vec<i64> {
        let mut available = Vec::with_capacity(concert.ticket_classes.len());
        for tc in &concert.ticket_classes {
            match self.class_available(tc.id).await {
                Ok((n, _)) => available.push(n),
                Err(e) => {
                    warn!(ticket_class_id = tc.id, error = %e, "Using durable mirror for availability");
                    available.push(i64::from(tc.available_seats_in_class));
                }
            }
        }
        available
    }
}
