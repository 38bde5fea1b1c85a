use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CounterError, CounterStore};

/// In-process counter store with the same CAS contract as Redis.
///
/// Supports failure injection: the whole store can be marked unavailable, and
/// a number of upcoming CAS calls can be forced to lose their race.
#[derive(Default)]
pub struct MemoryCounterStore {
    values: Mutex<HashMap<i64, i64>>,
    unavailable: AtomicBool,
    forced_conflicts: AtomicU32,
    cas_calls: AtomicU32,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// The next `n` compare-and-swap calls report a conflict without writing.
    pub fn force_conflicts(&self, n: u32) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    pub fn cas_calls(&self) -> u32 {
        self.cas_calls.load(Ordering::SeqCst)
    }

    pub async fn remove(&self, ticket_class_id: i64) {
        self.values.lock().await.remove(&ticket_class_id);
    }

    fn check_available(&self) -> Result<(), CounterError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CounterError::Unavailable(
                "injected counter store outage".to_string(),
            ));
        }
        Ok(())
    }

    fn take_forced_conflict(&self) -> bool {
        self.forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, ticket_class_id: i64) -> Result<Option<i64>, CounterError> {
        self.check_available()?;
        Ok(self.values.lock().await.get(&ticket_class_id).copied())
    }

    async fn set(&self, ticket_class_id: i64, value: i64) -> Result<(), CounterError> {
        self.check_available()?;
        self.values.lock().await.insert(ticket_class_id, value);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        ticket_class_id: i64,
        expected: Option<i64>,
        new: i64,
    ) -> Result<bool, CounterError> {
        self.check_available()?;
        self.cas_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_forced_conflict() {
            return Ok(false);
        }

        let mut values = self.values.lock().await;
        if values.get(&ticket_class_id).copied() != expected {
            return Ok(false);
        }
        values.insert(ticket_class_id, new);
        Ok(true)
    }
}
