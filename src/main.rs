use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use encore_booking::auth::JwtVerifier;
use encore_booking::config::Config;
use encore_booking::counter::RedisCounterStore;
use encore_booking::queue::RedisSeatQueue;
use encore_booking::rate_limit::{RateLimit, RateLimitPolicy, RedisRateLimiter};
use encore_booking::routes::create_routes;
use encore_booking::services::HttpPaymentNotifier;
use encore_booking::state::AppState;
use encore_booking::store::PgBookingStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let store = PgBookingStore::connect(&config.database_url, config.database_max_connections)
        .await
        .expect("Failed to connect to database");
    store.migrate().await.expect("Failed to run migrations");

    let counters = RedisCounterStore::connect(&config.redis_url)
        .await
        .expect("Failed to connect to Redis");
    let queue = RedisSeatQueue::connect(&config.redis_url, config.seat_creation_queue.clone())
        .await
        .expect("Failed to connect seat queue");
    let limiter = RedisRateLimiter::connect(&config.redis_url)
        .await
        .expect("Failed to connect rate limiter");
    let notifier = HttpPaymentNotifier::new(config.payment_service_url.clone())
        .expect("Failed to build payment client");

    let state = AppState::new(
        Arc::new(store),
        Arc::new(counters),
        Arc::new(queue),
        Arc::new(notifier),
        JwtVerifier::new(&config.jwt_secret),
        config.booking_ttl,
    )
    .with_rate_limit(RateLimit::new(
        Arc::new(limiter),
        RateLimitPolicy {
            max_requests: config.rate_limit_max_requests,
            window: config.rate_limit_window,
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if let Err(e) = state.concerts.recover_pending().await {
        tracing::error!(error = %e, "Failed to re-queue pending seat creation");
    }
    let worker = state.concerts.clone().spawn_worker(shutdown_rx.clone());
    let reaper = state.reaper(config.reaper_interval).spawn(shutdown_rx);

    let app = create_routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server failed");

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(worker, reaper);
    tracing::info!("Background tasks stopped");
}
