//! Work queue feeding the seat materialization worker.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::SeatCreationMessage;

mod memory;
mod redis_queue;

pub use memory::MemorySeatQueue;
pub use redis_queue::RedisSeatQueue;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("malformed queue message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("queue closed")]
    Closed,
}

#[async_trait]
pub trait SeatQueue: Send + Sync {
    async fn publish(&self, message: &SeatCreationMessage) -> Result<(), QueueError>;

    /// Waits for the next message. `Ok(None)` means the poll window elapsed
    /// with nothing to do.
    async fn next(&self) -> Result<Option<SeatCreationMessage>, QueueError>;
}
