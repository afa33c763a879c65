use axum::{
    extract::{Form, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::responses::JsonResponse;
use crate::services::stripe::{
    CheckoutLineItem, CreateCheckoutSessionRequest, StripeServiceError,
};
use crate::state::AppState;
use crate::utils::checkout_ownership::{ownership_cookie, verify_session_cookie, CHECKOUT_COOKIE};

#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub lookup_key: String,
}

#[derive(Debug, Deserialize)]
pub struct PortalForm {
    #[serde(default)]
    pub session_id: String,
}

// POST /create-checkout-session
pub async fn create_checkout_session(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CheckoutForm>,
) -> Response {
    let lookup_key = form.lookup_key.trim();
    let checkout = &app_state.config.checkout;
    if lookup_key.is_empty() || !checkout.is_lookup_key_allowed(lookup_key) {
        warn!(lookup_key, "checkout requested with an unknown lookup key");
        return JsonResponse::bad_request("Price not found").into_response();
    }

    let price = match app_state.stripe.find_price_by_lookup_key(lookup_key).await {
        Ok(Some(price)) => price,
        Ok(None) => {
            warn!(lookup_key, "no stripe price carries this lookup key");
            return JsonResponse::bad_request("Price not found").into_response();
        }
        Err(err) => {
            error!(?err, lookup_key, "stripe price lookup failed");
            return JsonResponse::server_error("Failed to create checkout session").into_response();
        }
    };

    let req = CreateCheckoutSessionRequest {
        success_url: checkout.success_url.clone(),
        cancel_url: checkout.cancel_url.clone(),
        line_items: vec![CheckoutLineItem {
            price: price.id.clone(),
            quantity: 1,
        }],
        billing_cycle_anchor: checkout.billing_cycle_anchor,
        automatic_tax: checkout.automatic_tax,
    };

    let session = match app_state.stripe.create_checkout_session(req).await {
        Ok(session) => session,
        Err(err) => {
            error!(?err, price_id = %price.id, "stripe checkout session creation failed");
            return JsonResponse::server_error("Failed to create checkout session").into_response();
        }
    };

    let Some(url) = session.url.as_deref() else {
        error!(session_id = %session.id, "stripe checkout session has no redirect url");
        return JsonResponse::server_error("Failed to create checkout session").into_response();
    };

    debug!(
        session_id = %session.id,
        success_url = %checkout.resolved_success_url(&session.id),
        "checkout success url resolved"
    );
    info!(session_id = %session.id, price_id = %price.id, "created checkout session");

    let jar = jar.add(ownership_cookie(
        &app_state.config.session_secret,
        &session.id,
        app_state.config.auth_cookie_secure,
    ));
    (jar, Redirect::to(url)).into_response()
}

// POST /create-portal-session
pub async fn create_portal_session(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<PortalForm>,
) -> Response {
    let session_id = form.session_id.trim();
    if session_id.is_empty() {
        return JsonResponse::bad_request("Missing session_id").into_response();
    }

    let owned = jar
        .get(CHECKOUT_COOKIE)
        .map(|c| verify_session_cookie(&app_state.config.session_secret, c.value(), session_id))
        .unwrap_or(false);
    if !owned {
        warn!(session_id, "portal requested for a checkout session this client did not start");
        return JsonResponse::forbidden_with_code(
            "Not allowed to manage this subscription",
            "checkout_not_owned",
        )
        .into_response();
    }

    let checkout = match app_state.stripe.retrieve_checkout_session(session_id).await {
        Ok(session) => session,
        Err(err) => {
            if matches!(err, StripeServiceError::NotFound(_)) {
                warn!(?err, session_id, "checkout session not found");
            } else {
                error!(?err, session_id, "failed to retrieve checkout session");
            }
            return JsonResponse::server_error("Failed to create portal session").into_response();
        }
    };

    let Some(customer_id) = checkout.customer.as_deref() else {
        error!(session_id, "checkout session has no customer");
        return JsonResponse::server_error("Failed to create portal session").into_response();
    };

    let portal = match app_state
        .stripe
        .create_portal_session(customer_id, &app_state.config.checkout.portal_return_url)
        .await
    {
        Ok(portal) => portal,
        Err(err) => {
            error!(?err, session_id, customer_id, "stripe portal session creation failed");
            return JsonResponse::server_error("Failed to create portal session").into_response();
        }
    };

    info!(session_id, customer_id, portal_session_id = %portal.id, "created billing portal session");
    Redirect::to(&portal.url).into_response()
}
