// NOTE: async-stripe is compiled with a minimal feature set (runtime-tokio-hyper, checkout and
// billing for the portal session). Webhook payloads are verified and decoded locally, so the
// webhook-events feature is not enabled. Touching APIs outside those features will require
// updating Cargo.toml explicitly.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StripeServiceError {
    #[error("stripe api error: {0}")]
    Api(String),
    #[error("webhook verification failed: {0}")]
    Webhook(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("other error: {0}")]
    Other(String),
}

impl From<stripe::StripeError> for StripeServiceError {
    fn from(err: stripe::StripeError) -> Self {
        match err {
            stripe::StripeError::Stripe(ref req) if req.http_status == 404 => {
                StripeServiceError::NotFound(err.to_string())
            }
            other => StripeServiceError::Api(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Price {
    pub id: String,
    pub lookup_key: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutLineItem {
    pub price: String,
    pub quantity: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateCheckoutSessionRequest {
    pub success_url: String,
    pub cancel_url: String,
    pub line_items: Vec<CheckoutLineItem>,
    /// Unix timestamp (seconds) the subscription's billing cycle is anchored to
    pub billing_cycle_anchor: Option<i64>,
    pub automatic_tax: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub customer: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

/// Webhook envelope after signature verification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    pub r#type: String,
    pub payload: serde_json::Value,
}

#[async_trait]
pub trait StripeService: Send + Sync {
    async fn find_price_by_lookup_key(
        &self,
        lookup_key: &str,
    ) -> Result<Option<Price>, StripeServiceError>;

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError>;

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeServiceError>;

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, StripeServiceError>;
}

pub mod events;
mod live;
mod mock;
pub mod webhook;

pub use events::{DispatchOutcome, EventDispatcher, SubscriptionRecord};
pub use live::LiveStripeService;
#[allow(unused_imports)]
pub use mock::MockStripeService;
pub use webhook::WebhookVerifier;
