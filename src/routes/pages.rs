use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use crate::responses::JsonResponse;
use crate::state::AppState;
use crate::utils::html::escape;

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape(title),
        body = body
    ))
}

// GET /
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let lookup_key = escape(&state.config.checkout.default_lookup_key);
    page(
        "Subscribe",
        &format!(
            r#"  <h1>Subscribe</h1>
  <form action="/create-checkout-session" method="POST">
    <input type="hidden" name="lookup_key" value="{lookup_key}">
    <button id="checkout-and-portal-button" type="submit">Pay</button>
  </form>"#
        ),
    )
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    #[serde(default)]
    pub session_id: String,
}

// GET /success.html?session_id=...
pub async fn success(Query(query): Query<SuccessQuery>) -> Html<String> {
    let session_id = escape(&query.session_id);
    page(
        "Subscription active",
        &format!(
            r#"  <h1>Subscription active</h1>
  <form action="/create-portal-session" method="POST">
    <input type="hidden" name="session_id" value="{session_id}">
    <button id="checkout-and-portal-button" type="submit">Manage your billing information</button>
  </form>"#
        ),
    )
}

// GET /cancel.html
pub async fn cancel() -> Html<String> {
    page(
        "Checkout canceled",
        r#"  <h1>Checkout canceled</h1>
  <p>No charge was made. <a href="/">Start over</a>.</p>"#,
    )
}

pub async fn not_found() -> Response {
    JsonResponse::not_found("Not found").into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::routes::router;
    use crate::services::stripe::MockStripeService;
    use crate::state::test_state;

    async fn get(uri: &str) -> (StatusCode, String) {
        let app = router(test_state(Arc::new(MockStripeService::new())));
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn index_renders_pay_form_with_default_lookup_key() {
        let (status, body) = get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"action="/create-checkout-session""#));
        assert!(body.contains(r#"name="lookup_key" value="standard_monthly""#));
        assert!(body.contains(">Pay</button>"));
    }

    #[tokio::test]
    async fn success_page_escapes_session_id() {
        let (status, body) = get("/success.html?session_id=%22%3E%3Cscript%3E").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"action="/create-portal-session""#));
        assert!(body.contains("&quot;&gt;&lt;script&gt;"));
        assert!(!body.contains("<script>"));
    }

    #[tokio::test]
    async fn cancel_page_links_home() {
        let (status, body) = get("/cancel.html").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"<a href="/">"#));
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let (status, _) = get("/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
