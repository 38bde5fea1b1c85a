use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use uuid::Uuid;

use super::{RateLimitError, RateLimiter};

const OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Sliding window over a Redis sorted set scored by request time in
/// milliseconds.
#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: ConnectionManager,
}

impl RedisRateLimiter {
    pub async fn connect(redis_url: &str) -> Result<Self, RateLimitError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        tracing::info!("Redis rate limiter connected");

        Ok(Self { conn })
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn record(&self, key: &str, window: Duration) -> Result<u64, RateLimitError> {
        let mut conn = self.conn.clone();
        let now_ms = Self::now_ms();
        let window_start = now_ms.saturating_sub(window.as_millis() as u64);
        // Members must be unique or same-millisecond requests collapse into one.
        let member = format!("{now_ms}-{}", Uuid::new_v4());
        let ttl_secs = window.as_secs().max(1) as i64 + 1;

        // Prune, count and record in one MULTI so concurrent requests cannot
        // both see a count below the limit.
        let mut pipe = redis::pipe();
        pipe.atomic()
            .zrembyscore(key, 0, window_start)
            .ignore()
            .zcard(key)
            .zadd(key, &member, now_ms)
            .ignore()
            .expire(key, ttl_secs)
            .ignore();

        let query = async {
            let (seen,): (u64,) = pipe.query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(seen)
        };
        match tokio::time::timeout(OP_TIMEOUT, query).await {
            Ok(result) => result.map_err(RateLimitError::from),
            Err(_) => Err(RateLimitError::Timeout(OP_TIMEOUT)),
        }
    }
}
