use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{AsyncCommands, Client};
use tokio::sync::Mutex;

use super::{QueueError, SeatQueue};
use crate::models::SeatCreationMessage;

const DEFAULT_POLL: Duration = Duration::from_secs(5);

/// Redis list queue: producers `LPUSH`, the worker `BRPOP`s.
///
/// The blocking pop runs on its own connection so it never stalls the
/// publisher.
pub struct RedisSeatQueue {
    name: String,
    publisher: ConnectionManager,
    consumer: Mutex<MultiplexedConnection>,
    poll: Duration,
}

impl RedisSeatQueue {
    pub async fn connect(redis_url: &str, name: impl Into<String>) -> Result<Self, QueueError> {
        let client = Client::open(redis_url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;
        let consumer = client.get_multiplexed_async_connection().await?;
        let name = name.into();

        tracing::info!(queue = %name, "Redis seat queue connected");

        Ok(Self {
            name,
            publisher,
            consumer: Mutex::new(consumer),
            poll: DEFAULT_POLL,
        })
    }
}

#[async_trait]
impl SeatQueue for RedisSeatQueue {
    async fn publish(&self, message: &SeatCreationMessage) -> Result<(), QueueError> {
        let payload = serde_json::to_string(message)?;
        let mut conn = self.publisher.clone();
        conn.lpush::<_, _, ()>(&self.name, payload).await?;
        Ok(())
    }

    async fn next(&self) -> Result<Option<SeatCreationMessage>, QueueError> {
        let mut conn = self.consumer.lock().await;
        let popped: Option<(String, String)> =
            conn.brpop(&self.name, self.poll.as_secs_f64()).await?;

        match popped {
            Some((_, payload)) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}
