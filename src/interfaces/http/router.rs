//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Create the onboarding API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Customers
        .route(
            "/customers",
            get(handlers::list_customers).post(handlers::create_customer),
        )
        .route("/customers/:id", get(handlers::get_customer))
        .route(
            "/customers/:id/funding-sources",
            post(handlers::attach_funding_source),
        )
        .route("/customers/:id/payments", post(handlers::make_payment))
        // Funding sources
        .route("/funding-sources/:id", get(handlers::get_funding_source))
        .route(
            "/funding-sources/:id/trial-deposits",
            post(handlers::initiate_trial_deposits),
        )
        .route(
            "/funding-sources/:id/verify",
            post(handlers::verify_trial_deposits),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
