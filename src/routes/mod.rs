use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{apply_security_headers, create_cors_layer, SecurityHeaders};
use crate::handlers::{
    cancel_booking, concert_availability, concert_seats, create_booking, create_concert,
    get_booking, get_concert, health_check, list_concerts, my_bookings, update_booking_status,
};
use crate::rate_limit::enforce_rate_limit;
use crate::state::AppState;

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/bookings", post(create_booking))
        .route("/bookings/my", get(my_bookings))
        .route("/bookings/:id", get(get_booking))
        .route("/bookings/:id/cancel", put(cancel_booking))
        .route("/internal/bookings/:id/status", put(update_booking_status))
        .route("/concerts", get(list_concerts))
        .route("/concerts/:id", get(get_concert))
        .route("/concerts/:id/seats", get(concert_seats))
        .route("/concerts/:id/availability", get(concert_availability))
        .route("/admin/concerts", post(create_concert))
}

pub fn create_routes(state: AppState) -> Router {
    create_routes_with(state, SecurityHeaders::from_env())
}

pub fn create_routes_with(state: AppState, security: SecurityHeaders) -> Router {
    let router = Router::new()
        .nest("/api/v1", api_routes())
        .layer(middleware::from_fn_with_state(state.clone(), enforce_rate_limit));

    apply_security_headers(router, security)
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
