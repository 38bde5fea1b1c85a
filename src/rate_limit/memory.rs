use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{RateLimitError, RateLimiter};

/// In-process sliding window, one queue of request instants per key.
#[derive(Default)]
pub struct MemoryRateLimiter {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn record(&self, key: &str, window: Duration) -> Result<u64, RateLimitError> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let entries = windows.entry(key.to_string()).or_default();
        while entries
            .front()
            .is_some_and(|at| now.duration_since(*at) >= window)
        {
            entries.pop_front();
        }
        let seen = entries.len() as u64;
        entries.push_back(now);
        Ok(seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_age_out_of_the_window() {
        let limiter = MemoryRateLimiter::new();
        let window = Duration::from_secs(60);

        assert_eq!(limiter.record("k", window).await.unwrap(), 0);
        assert_eq!(limiter.record("k", window).await.unwrap(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.record("k", window).await.unwrap(), 0);
    }
}
