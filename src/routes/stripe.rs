use axum::Json;
use axum::{body::Body, extract::State, http::HeaderMap, response::IntoResponse};
use axum::response::Response;
use tracing::{error, info, warn};

use crate::responses::JsonResponse;
use crate::services::stripe::webhook::{MAX_WEBHOOK_BODY_BYTES, SIGNATURE_HEADER};
use crate::services::stripe::DispatchOutcome;
use crate::state::AppState;

// POST /webhook
pub async fn webhook(State(app_state): State<AppState>, headers: HeaderMap, body: Body) -> Response {
    let payload = match axum::body::to_bytes(body, MAX_WEBHOOK_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(?err, limit = MAX_WEBHOOK_BODY_BYTES, "error reading stripe webhook body");
            return JsonResponse::service_unavailable("Unable to read request body")
                .into_response();
        }
    };

    let sig = match headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
    {
        Some(s) => s,
        None => return JsonResponse::bad_request("Missing Stripe-Signature").into_response(),
    };

    let evt = match app_state.webhook_verifier.verify(&payload, sig) {
        Ok(e) => e,
        Err(err) => {
            warn!(?err, "stripe webhook verification failed");
            return JsonResponse::bad_request("invalid webhook").into_response();
        }
    };

    match app_state.events.dispatch(&evt) {
        Ok(DispatchOutcome::Handled(evt_type)) => {
            info!(event_id = %evt.id, evt_type = %evt_type, "stripe event handled");
        }
        Ok(DispatchOutcome::Ignored(_)) => {}
        Err(err) => {
            warn!(?err, event_id = %evt.id, evt_type = %evt.r#type, "error parsing webhook json");
            return JsonResponse::bad_request("invalid webhook payload").into_response();
        }
    }

    Json(serde_json::json!({ "received": true })).into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    use crate::routes::router;
    use crate::services::stripe::events::SUBSCRIPTION_DELETED;
    use crate::services::stripe::{EventDispatcher, MockStripeService, WebhookVerifier};
    use crate::state::test_state;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(crate::config::test_config().stripe.webhook_secret, 300)
    }

    fn now() -> i64 {
        time::OffsetDateTime::now_utc().unix_timestamp()
    }

    fn app() -> Router {
        router(test_state(Arc::new(MockStripeService::new())))
    }

    fn webhook_request(body: Vec<u8>, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("Content-Type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header("Stripe-Signature", sig);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn event_body(ty: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "id": "evt_123",
            "object": "event",
            "type": ty,
            "data": { "object": { "id": "sub_123", "object": "subscription", "status": "active", "customer": "cus_123" } }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn signed_recognized_event_is_acknowledged() {
        for ty in [
            "customer.subscription.created",
            "customer.subscription.updated",
            "customer.subscription.deleted",
            "customer.subscription.trial_will_end",
            "entitlements.active_entitlement_summary.updated",
        ] {
            let body = event_body(ty);
            let sig = verifier().sign(&body, now());
            let response = app().oneshot(webhook_request(body, Some(sig))).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "event type {}", ty);

            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(json["received"], true);
        }
    }

    #[tokio::test]
    async fn signed_unrecognized_event_is_acknowledged() {
        let body = event_body("invoice.paid");
        let sig = verifier().sign(&body, now());
        let response = app().oneshot(webhook_request(body, Some(sig))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn dispatch_reaches_registered_handler() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = seen.clone();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(SUBSCRIPTION_DELETED, move |_, sub| {
            sink.lock().unwrap().push(sub.id.clone());
        });
        let mut state = test_state(Arc::new(MockStripeService::new()));
        state.events = Arc::new(dispatcher);

        let body = event_body(SUBSCRIPTION_DELETED);
        let sig = verifier().sign(&body, now());
        let response = router(state)
            .oneshot(webhook_request(body, Some(sig)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*seen.lock().unwrap(), vec!["sub_123".to_string()]);
    }

    #[tokio::test]
    async fn invalid_signature_is_400_regardless_of_payload() {
        for body in [event_body("customer.subscription.updated"), b"not json".to_vec()] {
            let sig = format!("t={},v1={}", now(), "00".repeat(32));
            let response = app().oneshot(webhook_request(body, Some(sig))).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn signature_from_other_secret_is_400() {
        let body = event_body("customer.subscription.updated");
        let sig = WebhookVerifier::new("whsec_someone_else", 300).sign(&body, now());
        let response = app().oneshot(webhook_request(body, Some(sig))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_signature_header_is_400() {
        let body = event_body("customer.subscription.updated");
        let response = app().oneshot(webhook_request(body, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signed_malformed_payload_is_400() {
        let body = serde_json::to_vec(&serde_json::json!({
            "id": "evt_bad",
            "type": "customer.subscription.updated",
            "data": { "object": { "id": 42 } }
        }))
        .unwrap();
        let sig = verifier().sign(&body, now());
        let response = app().oneshot(webhook_request(body, Some(sig))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_body_is_503_before_verification() {
        let mut body = event_body("customer.subscription.updated");
        body.resize(64 * 1024 + 1, b' ');
        // Correctly signed: only the size limit can reject it
        let sig = verifier().sign(&body, now());
        let response = app().oneshot(webhook_request(body, Some(sig))).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn body_at_limit_is_accepted() {
        let mut body = event_body("customer.subscription.updated");
        body.resize(64 * 1024, b' ');
        let sig = verifier().sign(&body, now());
        let response = app().oneshot(webhook_request(body, Some(sig))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
