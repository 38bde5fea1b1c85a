//! Per-client request rate limiting.
//!
//! Every request is recorded against the caller's address in a sliding
//! window; once a client has used up its budget further requests get a 429
//! until old entries age out of the window.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use thiserror::Error;

use crate::state::AppState;
use crate::utils::error::AppError;

mod memory;
mod redis_store;

pub use memory::MemoryRateLimiter;
pub use redis_store::RedisRateLimiter;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("rate limiter call exceeded {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Records one request for `key` and returns how many earlier requests
    /// from the same key fall inside `window`.
    async fn record(&self, key: &str, window: Duration) -> Result<u64, RateLimitError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u64,
    pub window: Duration,
}

/// A limiter paired with the policy it enforces.
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<dyn RateLimiter>,
    policy: RateLimitPolicy,
}

impl RateLimit {
    pub fn new(limiter: Arc<dyn RateLimiter>, policy: RateLimitPolicy) -> Self {
        Self { limiter, policy }
    }

    pub async fn check(&self, client: &str) -> Result<(), AppError> {
        let key = rate_limit_key(client);
        let seen = self
            .limiter
            .record(&key, self.policy.window)
            .await
            .map_err(|e| AppError::InternalServerError(format!("rate limiter failed: {e}")))?;

        if seen >= self.policy.max_requests {
            tracing::warn!(
                client,
                requests = seen + 1,
                max_requests = self.policy.max_requests,
                window_secs = self.policy.window.as_secs(),
                "Rate limit exceeded"
            );
            return Err(AppError::RateLimited(format!(
                "{client} exceeded {} requests per {}s",
                self.policy.max_requests,
                self.policy.window.as_secs()
            )));
        }
        Ok(())
    }
}

pub fn rate_limit_key(client: &str) -> String {
    format!("rate_limit:{client}")
}

/// The caller's address: the first `X-Forwarded-For` hop, then `X-Real-IP`,
/// then the peer address of the connection.
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware rejecting clients over their budget. A state without a rate
/// limit lets everything through.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(rate_limit) = &state.rate_limit {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client = client_address(request.headers(), peer);
        rate_limit.check(&client).await?;
    }
    Ok(next.run(request).await)
}
