//! Seat capacity reservation against the shared counter store.
//!
//! Each reserve or release is an optimistic read-check-swap loop. The swap is
//! evaluated by the counter store, so concurrent writers in any process
//! serialize there and the losers retry against the fresh value.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::error::ReservationError;
use crate::counter::CounterStore;

pub const MAX_CAS_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct ReservationEngine {
    counters: Arc<dyn CounterStore>,
}

impl ReservationEngine {
    pub fn new(counters: Arc<dyn CounterStore>) -> Self {
        Self { counters }
    }

    /// Takes `quantity` seats from the class counter and returns what is left.
    pub async fn reserve(&self, ticket_class_id: i64, quantity: i64) -> Result<i64, ReservationError> {
        if quantity <= 0 {
            return Err(ReservationError::InvalidQuantity(quantity));
        }

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.counters.get(ticket_class_id).await?;
            let available = current.unwrap_or(0);
            if available < quantity {
                return Err(ReservationError::InsufficientInventory {
                    ticket_class_id,
                    requested: quantity,
                    available,
                });
            }

            let remaining = available - quantity;
            if self
                .counters
                .compare_and_swap(ticket_class_id, current, remaining)
                .await?
            {
                debug!(ticket_class_id, quantity, remaining, attempt, "Seats reserved");
                return Ok(remaining);
            }
            debug!(ticket_class_id, attempt, "Reserve lost a race, retrying");
        }

        warn!(ticket_class_id, quantity, "Reserve gave up under contention");
        Err(ReservationError::ContentionExhausted {
            ticket_class_id,
            attempts: MAX_CAS_ATTEMPTS,
        })
    }

    /// Hands `quantity` seats back to the class counter and returns the new value.
    pub async fn release(&self, ticket_class_id: i64, quantity: i64) -> Result<i64, ReservationError> {
        if quantity <= 0 {
            return Err(ReservationError::InvalidQuantity(quantity));
        }

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.counters.get(ticket_class_id).await?;
            let restored = current.unwrap_or(0) + quantity;
            if self
                .counters
                .compare_and_swap(ticket_class_id, current, restored)
                .await?
            {
                debug!(ticket_class_id, quantity, restored, attempt, "Seats released");
                return Ok(restored);
            }
            debug!(ticket_class_id, attempt, "Release lost a race, retrying");
        }

        Err(ReservationError::ContentionExhausted {
            ticket_class_id,
            attempts: MAX_CAS_ATTEMPTS,
        })
    }

    /// Release used on compensation paths: failures are logged, never returned.
    pub async fn release_logged(&self, ticket_class_id: i64, quantity: i64) {
        if let Err(e) = self.release(ticket_class_id, quantity).await {
            error!(
                ticket_class_id,
                quantity,
                error = %e,
                "Failed to release seats, counter now under-reports availability"
            );
        }
    }
}
