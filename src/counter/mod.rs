//! Availability counters: one integer per ticket class holding the number of
//! seats still reservable in that class.
//!
//! The store is shared by every service process, so the only write primitive
//! offered is a compare-and-swap evaluated by the store itself.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod memory;
mod redis_store;

pub use memory::MemoryCounterStore;
pub use redis_store::RedisCounterStore;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("counter store call exceeded {0:?}")]
    Timeout(Duration),

    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current counter, `None` when the key does not exist.
    async fn get(&self, ticket_class_id: i64) -> Result<Option<i64>, CounterError>;

    /// Unconditional overwrite, used for seeding and cache repair.
    async fn set(&self, ticket_class_id: i64, value: i64) -> Result<(), CounterError>;

    /// Writes `new` only if the key still holds `expected` (`None` meaning the
    /// key is absent). Returns `false` when another writer got there first.
    async fn compare_and_swap(
        &self,
        ticket_class_id: i64,
        expected: Option<i64>,
        new: i64,
    ) -> Result<bool, CounterError>;
}

pub fn counter_key(ticket_class_id: i64) -> String {
    format!("ticket_class:{ticket_class_id}:available_seats")
}
