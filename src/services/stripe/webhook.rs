use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{StripeEvent, StripeServiceError};

type HmacSha256 = Hmac<Sha256>;

/// Largest webhook body accepted, in bytes.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 64 * 1024;
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Checks `Stripe-Signature` headers against the endpoint secret and decodes the envelope.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, StripeServiceError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => {
                timestamp = Some(v.parse::<i64>().map_err(|_| {
                    StripeServiceError::Webhook("invalid timestamp in signature header".into())
                })?)
            }
            Some(("v1", v)) => signatures.push(v),
            // v0 and unknown schemes are ignored
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        StripeServiceError::Webhook("missing timestamp in signature header".into())
    })?;
    if signatures.is_empty() {
        return Err(StripeServiceError::Webhook(
            "no v1 signature in signature header".into(),
        ));
    }
    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    pub fn from_settings(settings: &crate::config::StripeSettings) -> Self {
        Self::new(
            settings.webhook_secret.clone(),
            settings.webhook_tolerance_secs,
        )
    }

    fn expected_signature(&self, timestamp: i64, payload: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn verify(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        self.verify_at(payload, signature_header, now)
    }

    /// Same as [`verify`](Self::verify) with an explicit clock.
    pub fn verify_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<StripeEvent, StripeServiceError> {
        let header = parse_header(signature_header)?;
        let expected = self.expected_signature(header.timestamp, payload);
        let matched = header
            .signatures
            .iter()
            .any(|sig| bool::from(expected.as_bytes().ct_eq(sig.as_bytes())));
        if !matched {
            return Err(StripeServiceError::Webhook(
                "no signature matches the expected signature for the payload".into(),
            ));
        }
        let within_tolerance = now
            .checked_sub(header.timestamp)
            .is_some_and(|age| age.unsigned_abs() <= self.tolerance_secs.unsigned_abs());
        if !within_tolerance {
            return Err(StripeServiceError::Webhook(
                "timestamp outside the tolerance zone".into(),
            ));
        }

        parse_event(payload)
    }

    /// Builds a header the way Stripe would sign `payload` at `timestamp`.
    #[cfg(test)]
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        format!(
            "t={},v1={}",
            timestamp,
            self.expected_signature(timestamp, payload)
        )
    }
}

fn parse_event(payload: &[u8]) -> Result<StripeEvent, StripeServiceError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| StripeServiceError::Serde(e.to_string()))?;
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| StripeServiceError::Serde("event is missing an id".into()))?
        .to_string();
    let ty = value
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| StripeServiceError::Serde("event is missing a type".into()))?
        .to_string();
    Ok(StripeEvent {
        id,
        r#type: ty,
        payload: value,
    })
}
