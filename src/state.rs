use crate::config::Config;
use crate::services::stripe::{EventDispatcher, StripeService, WebhookVerifier};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub stripe: Arc<dyn StripeService>,
    pub webhook_verifier: Arc<WebhookVerifier>,
    pub events: Arc<EventDispatcher>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, stripe: Arc<dyn StripeService>) -> Self {
        Self {
            webhook_verifier: Arc::new(WebhookVerifier::from_settings(&config.stripe)),
            events: Arc::new(EventDispatcher::with_default_handlers()),
            stripe,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
pub fn test_state(stripe: Arc<crate::services::stripe::MockStripeService>) -> AppState {
    AppState::new(crate::config::test_config(), stripe)
}
