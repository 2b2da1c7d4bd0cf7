use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod webhooks;

/// Full v1 API surface: catalog pass-through, checkout creation, the two
/// inbound webhooks, and the order read side.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/catalog/search", get(catalog::search_products))
        .route("/catalog/pricing", post(catalog::price_and_availability))
        .route("/checkout", post(checkout::create_checkout))
        .route("/webhooks/payments", post(webhooks::payment_webhook))
        .route("/webhooks/distributor", post(webhooks::distributor_webhook))
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
}
