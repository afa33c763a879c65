pub mod checkout;
pub mod pages;
pub mod stripe;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/success.html", get(pages::success))
        .route("/cancel.html", get(pages::cancel))
        .route(
            "/create-checkout-session",
            post(checkout::create_checkout_session),
        )
        .route(
            "/create-portal-session",
            post(checkout::create_portal_session),
        )
        // Public webhook route (no cookies, authenticated by signature)
        .route("/webhook", post(stripe::webhook))
        .fallback(pages::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
