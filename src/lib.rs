pub mod config;
pub mod currency;
pub mod db;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod novac;
pub mod signature;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::gateway::PaymentGateway;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub gateway: PaymentGateway,
    pub config: Config,
}

pub fn create_app(state: AppState) -> Router {
    // The allow-list guards only the webhook; donor-facing routes stay open.
    let webhook_routes = Router::new()
        .route("/gateway/webhook", post(handlers::webhook::webhook_listener))
        .layer(middleware::ip_filter::IpFilterLayer::new(
            state.config.allowed_webhook_ips.clone(),
            state.config.trusted_proxy_depth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/donations", post(handlers::donations::create_donation))
        .route("/donations/:id", get(handlers::donations::get_donation))
        .route("/donations/:id/notes", get(handlers::donations::list_notes))
        .route(
            "/donations/:id/checkout",
            post(handlers::donations::start_checkout),
        )
        .route(
            "/gateway/return",
            get(handlers::return_gateway::handle_return),
        )
        .route(
            "/gateway/return/cancelled",
            get(handlers::return_gateway::handle_cancelled_return),
        )
        .merge(webhook_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
