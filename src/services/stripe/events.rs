use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{StripeEvent, StripeServiceError};

pub const SUBSCRIPTION_CREATED: &str = "customer.subscription.created";
pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
pub const SUBSCRIPTION_TRIAL_WILL_END: &str = "customer.subscription.trial_will_end";
pub const ENTITLEMENT_SUMMARY_UPDATED: &str = "entitlements.active_entitlement_summary.updated";

/// The subset of a subscription object that event handlers look at.
///
/// Entitlement summaries are decoded into the same shape; they carry a customer
/// but no subscription id, so every field is optional on the wire.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub cancel_at_period_end: Option<bool>,
    /// Unix timestamp (seconds) when the current period ends
    #[serde(default)]
    pub current_period_end: Option<i64>,
    /// Unix timestamp (seconds) when the trial ends
    #[serde(default)]
    pub trial_end: Option<i64>,
}

impl SubscriptionRecord {
    /// Decodes `data.object` from an event envelope.
    pub fn from_event(event: &StripeEvent) -> Result<Self, StripeServiceError> {
        let object = event
            .payload
            .get("data")
            .and_then(|d| d.get("object"))
            .ok_or_else(|| StripeServiceError::Serde("event has no data.object".into()))?;
        if !object.is_object() {
            return Err(StripeServiceError::Serde(
                "event data.object is not an object".into(),
            ));
        }
        serde_json::from_value(object.clone()).map_err(|e| StripeServiceError::Serde(e.to_string()))
    }
}

pub type EventHandler = Arc<dyn Fn(&StripeEvent, &SubscriptionRecord) + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled(String),
    Ignored(String),
}

/// Maps event types to handlers; unknown types are acknowledged and ignored.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: HashMap<String, EventHandler>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher with the subscription lifecycle handlers registered.
    pub fn with_default_handlers() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(SUBSCRIPTION_CREATED, |evt, sub| {
            info!(event_id = %evt.id, subscription_id = %sub.id, status = ?sub.status, "subscription created");
        });
        dispatcher.register(SUBSCRIPTION_UPDATED, |evt, sub| {
            info!(
                event_id = %evt.id,
                subscription_id = %sub.id,
                status = ?sub.status,
                cancel_at_period_end = ?sub.cancel_at_period_end,
                "subscription updated"
            );
        });
        dispatcher.register(SUBSCRIPTION_DELETED, |evt, sub| {
            info!(event_id = %evt.id, subscription_id = %sub.id, "subscription deleted");
        });
        dispatcher.register(SUBSCRIPTION_TRIAL_WILL_END, |evt, sub| {
            info!(event_id = %evt.id, subscription_id = %sub.id, trial_end = ?sub.trial_end, "subscription trial will end");
        });
        dispatcher.register(ENTITLEMENT_SUMMARY_UPDATED, |evt, sub| {
            info!(event_id = %evt.id, customer = ?sub.customer, "active entitlement summary updated");
        });
        dispatcher
    }

    pub fn register<F>(&mut self, event_type: &str, handler: F)
    where
        F: Fn(&StripeEvent, &SubscriptionRecord) + Send + Sync + 'static,
    {
        self.handlers
            .insert(event_type.to_string(), Arc::new(handler));
    }

    pub fn dispatch(&self, event: &StripeEvent) -> Result<DispatchOutcome, StripeServiceError> {
        let Some(handler) = self.handlers.get(event.r#type.as_str()) else {
            info!(event_id = %event.id, event_type = %event.r#type, "unhandled stripe event acknowledged");
            return Ok(DispatchOutcome::Ignored(event.r#type.clone()));
        };

        let record = SubscriptionRecord::from_event(event)?;
        handler(event, &record);
        Ok(DispatchOutcome::Handled(event.r#type.clone()))
    }
}
