pub mod auth;
pub mod config;
pub mod counter;
pub mod handlers;
pub mod models;
pub mod queue;
pub mod rate_limit;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;
