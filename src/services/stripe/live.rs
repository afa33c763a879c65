use super::{
    CheckoutLineItem, CheckoutSession, CreateCheckoutSessionRequest, PortalSession,
    Price, StripeService, StripeServiceError,
};
use async_trait::async_trait;

pub struct LiveStripeService {
    client: stripe::Client,
}

impl LiveStripeService {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: stripe::Client::new(secret_key),
        }
    }

    /// Points the client at a different API host (used against local stand-ins).
    pub fn with_base_url(base_url: &str, secret_key: impl Into<String>) -> Self {
        Self {
            client: stripe::Client::from_url(base_url, secret_key),
        }
    }

    pub fn from_settings(settings: &crate::config::StripeSettings) -> Self {
        Self::new(settings.secret_key.clone())
    }
}

fn map_line_items(items: &[CheckoutLineItem]) -> Vec<stripe::CreateCheckoutSessionLineItems> {
    items
        .iter()
        .map(|li| stripe::CreateCheckoutSessionLineItems {
            price: Some(li.price.clone()),
            quantity: Some(li.quantity),
            ..Default::default()
        })
        .collect()
}

fn map_session(session: stripe::CheckoutSession) -> CheckoutSession {
    CheckoutSession {
        id: session.id.to_string(),
        url: session.url.clone(),
        customer: session.customer.as_ref().map(|c| c.id().to_string()),
    }
}

#[async_trait]
impl StripeService for LiveStripeService {
    async fn find_price_by_lookup_key(
        &self,
        lookup_key: &str,
    ) -> Result<Option<Price>, StripeServiceError> {
        let mut params = stripe::ListPrices::new();
        params.lookup_keys = Some(vec![lookup_key.to_string()]);
        params.limit = Some(1);

        let prices = stripe::Price::list(&self.client, &params).await?;
        Ok(prices.data.into_iter().next().map(|price| Price {
            id: price.id.to_string(),
            lookup_key: price.lookup_key,
        }))
    }

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(stripe::CheckoutSessionMode::Subscription);
        params.success_url = Some(&req.success_url);
        params.cancel_url = Some(&req.cancel_url);
        if !req.line_items.is_empty() {
            params.line_items = Some(map_line_items(&req.line_items));
        }
        if let Some(anchor) = req.billing_cycle_anchor {
            params.subscription_data = Some(stripe::CreateCheckoutSessionSubscriptionData {
                billing_cycle_anchor: Some(anchor),
                ..Default::default()
            });
        }
        if req.automatic_tax {
            params.automatic_tax = Some(stripe::CreateCheckoutSessionAutomaticTax {
                enabled: true,
                ..Default::default()
            });
        }

        let session = stripe::CheckoutSession::create(&self.client, params).await?;
        Ok(map_session(session))
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeServiceError> {
        let id = session_id
            .parse::<stripe::CheckoutSessionId>()
            .map_err(|e| StripeServiceError::Other(e.to_string()))?;
        let session = stripe::CheckoutSession::retrieve(&self.client, &id, &[]).await?;
        Ok(map_session(session))
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, StripeServiceError> {
        let customer = customer_id
            .parse::<stripe::CustomerId>()
            .map_err(|e| StripeServiceError::Other(e.to_string()))?;
        let mut params = stripe::CreateBillingPortalSession::new(customer);
        params.return_url = Some(return_url);

        let session = stripe::BillingPortalSession::create(&self.client, params).await?;
        Ok(PortalSession {
            id: session.id.to_string(),
            url: session.url,
        })
    }
}
