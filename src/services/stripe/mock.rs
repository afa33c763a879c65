#![allow(dead_code)]
use super::{
    CheckoutSession, CreateCheckoutSessionRequest, PortalSession, Price, StripeService,
    StripeServiceError,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory stand-in for the Stripe API that records every call it receives.
#[derive(Clone, Default)]
pub struct MockStripeService {
    pub prices: Arc<Mutex<HashMap<String, Price>>>,
    pub sessions: Arc<Mutex<HashMap<String, CheckoutSession>>>,
    pub created_sessions: Arc<Mutex<Vec<CheckoutSession>>>,
    pub price_lookups: Arc<Mutex<Vec<String>>>,
    pub last_create_requests: Arc<Mutex<Vec<CreateCheckoutSessionRequest>>>,
    pub retrieve_requests: Arc<Mutex<Vec<String>>>,
    pub portal_requests: Arc<Mutex<Vec<(String, String)>>>,
    pub new_session_customer: Arc<Mutex<Option<String>>>,
    pub fail_checkout_creation: Arc<Mutex<bool>>,
    pub fail_portal_creation: Arc<Mutex<bool>>,
    counter: Arc<AtomicU64>,
}

impl MockStripeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, lookup_key: &str, price_id: &str) -> Self {
        self.prices.lock().unwrap().insert(
            lookup_key.to_string(),
            Price {
                id: price_id.to_string(),
                lookup_key: Some(lookup_key.to_string()),
            },
        );
        self
    }

    pub fn with_checkout_session(self, session_id: &str, customer: Option<&str>) -> Self {
        self.sessions.lock().unwrap().insert(
            session_id.to_string(),
            CheckoutSession {
                id: session_id.to_string(),
                url: Some(checkout_url(session_id)),
                customer: customer.map(str::to_string),
            },
        );
        self
    }

    pub fn with_customer_for_new_sessions(self, customer: &str) -> Self {
        *self.new_session_customer.lock().unwrap() = Some(customer.to_string());
        self
    }

    pub fn failing_checkout(self) -> Self {
        *self.fail_checkout_creation.lock().unwrap() = true;
        self
    }

    pub fn failing_portal(self) -> Self {
        *self.fail_portal_creation.lock().unwrap() = true;
        self
    }

    /// Ids of sessions created through the API, oldest first.
    pub fn created_session_ids(&self) -> Vec<String> {
        self.created_sessions
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.id.clone())
            .collect()
    }

    fn make_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}_{:06}", prefix, n)
    }
}

fn checkout_url(session_id: &str) -> String {
    format!("https://checkout.stripe.com/c/pay/{}", session_id)
}

#[async_trait]
impl StripeService for MockStripeService {
    async fn find_price_by_lookup_key(
        &self,
        lookup_key: &str,
    ) -> Result<Option<Price>, StripeServiceError> {
        self.price_lookups
            .lock()
            .unwrap()
            .push(lookup_key.to_string());
        Ok(self.prices.lock().unwrap().get(lookup_key).cloned())
    }

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        // capture the request
        self.last_create_requests.lock().unwrap().push(req);

        if *self.fail_checkout_creation.lock().unwrap() {
            return Err(StripeServiceError::Api(
                "Invalid request: automatic tax requires a tax registration".into(),
            ));
        }

        // synthesize a session
        let id = self.make_id("cs_test");
        let session = CheckoutSession {
            url: Some(checkout_url(&id)),
            customer: self.new_session_customer.lock().unwrap().clone(),
            id,
        };
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        self.created_sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeServiceError> {
        self.retrieve_requests
            .lock()
            .unwrap()
            .push(session_id.to_string());
        let opt = self.sessions.lock().unwrap().get(session_id).cloned();
        opt.ok_or_else(|| {
            StripeServiceError::NotFound(format!("No such checkout.session: '{}'", session_id))
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, StripeServiceError> {
        self.portal_requests
            .lock()
            .unwrap()
            .push((customer_id.to_string(), return_url.to_string()));

        if *self.fail_portal_creation.lock().unwrap() {
            return Err(StripeServiceError::Api(format!(
                "No configuration provided for customer {}",
                customer_id
            )));
        }

        let id = self.make_id("bps_test");
        Ok(PortalSession {
            url: format!("https://billing.stripe.com/p/session/{}", id),
            id,
        })
    }
}
