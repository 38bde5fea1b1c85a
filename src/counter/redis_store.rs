use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisResult, Script};

use super::{counter_key, CounterError, CounterStore};

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(2);

// ARGV[1] is the value read by the caller ("" when the key was absent).
const CAS_SCRIPT: &str = r#"
    local current = redis.call('GET', KEYS[1])
    if ARGV[1] == '' then
        if current then
            return 0
        end
    elseif current ~= ARGV[1] then
        return 0
    end
    redis.call('SET', KEYS[1], ARGV[2])
    return 1
"#;

/// Counter store backed by Redis string keys `ticket_class:{id}:available_seats`.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    cas: Script,
    op_timeout: Duration,
}

impl RedisCounterStore {
    pub async fn connect(redis_url: &str) -> Result<Self, CounterError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        tracing::info!("Redis counter store connected");

        Ok(Self {
            conn,
            cas: Script::new(CAS_SCRIPT),
            op_timeout: DEFAULT_OP_TIMEOUT,
        })
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = RedisResult<T>>,
    ) -> Result<T, CounterError> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(CounterError::from),
            Err(_) => Err(CounterError::Timeout(self.op_timeout)),
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, ticket_class_id: i64) -> Result<Option<i64>, CounterError> {
        let mut conn = self.conn.clone();
        let key = counter_key(ticket_class_id);
        self.bounded(async move { conn.get::<_, Option<i64>>(&key).await })
            .await
    }

    async fn set(&self, ticket_class_id: i64, value: i64) -> Result<(), CounterError> {
        let mut conn = self.conn.clone();
        let key = counter_key(ticket_class_id);
        self.bounded(async move { conn.set::<_, _, ()>(&key, value).await })
            .await
    }

    async fn compare_and_swap(
        &self,
        ticket_class_id: i64,
        expected: Option<i64>,
        new: i64,
    ) -> Result<bool, CounterError> {
        let mut conn = self.conn.clone();
        let key = counter_key(ticket_class_id);
        let expected = expected.map(|v| v.to_string()).unwrap_or_default();
        let mut invocation = self.cas.key(key);
        invocation.arg(expected).arg(new);

        let swapped: i64 = self
            .bounded(async move { invocation.invoke_async(&mut conn).await })
            .await?;
        Ok(swapped == 1)
    }
}
