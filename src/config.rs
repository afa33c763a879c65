use std::{env, net::SocketAddr};

use thiserror::Error;

/// Placeholder Stripe replaces with the real checkout session id on redirect.
pub const CHECKOUT_SESSION_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";
/// Minimum acceptable size for the session signing secret in bytes.
pub const MIN_SESSION_SECRET_LENGTH: usize = 32;
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("SESSION_SIGNING_SECRET must be at least {required} bytes, but {actual} bytes were provided")]
    SecretTooShort { actual: usize, required: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
    /// Maximum age, in seconds, of the timestamp in a `Stripe-Signature` header.
    pub webhook_tolerance_secs: i64,
}

#[derive(Clone, Debug)]
pub struct CheckoutSettings {
    pub success_url: String,
    pub cancel_url: String,
    pub portal_return_url: String,
    pub billing_cycle_anchor: Option<i64>,
    pub automatic_tax: bool,
    /// When non-empty, only these lookup keys may be used to start a checkout.
    pub allowed_lookup_keys: Vec<String>,
    /// Lookup key submitted by the index page's pay button.
    pub default_lookup_key: String,
}

impl CheckoutSettings {
    pub fn is_lookup_key_allowed(&self, lookup_key: &str) -> bool {
        self.allowed_lookup_keys.is_empty()
            || self.allowed_lookup_keys.iter().any(|k| k == lookup_key)
    }

    /// Success URL with the placeholder replaced by a concrete session id.
    pub fn resolved_success_url(&self, session_id: &str) -> String {
        self.success_url
            .replace(CHECKOUT_SESSION_PLACEHOLDER, session_id)
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub stripe: StripeSettings,
    pub checkout: CheckoutSettings,
    pub session_secret: String,
    pub auth_cookie_secure: bool,
    pub log_format: LogFormat,
    pub sentry_dsn: Option<sentry::types::Dsn>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok(); // Load .env file

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let secret_key = require("STRIPE_SECRET_KEY")?;
        let webhook_secret = require("STRIPE_WEBHOOK_SECRET")?;
        let webhook_tolerance_secs = match get("STRIPE_WEBHOOK_TOLERANCE_SECONDS") {
            Some(raw) => parse_number(&raw, "STRIPE_WEBHOOK_TOLERANCE_SECONDS")?,
            None => DEFAULT_WEBHOOK_TOLERANCE_SECS,
        };

        let public_domain = require("PUBLIC_DOMAIN")?
            .trim_end_matches('/')
            .to_string();
        if !public_domain.starts_with("http://") && !public_domain.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "PUBLIC_DOMAIN",
                reason: "must start with http:// or https://".into(),
            });
        }

        let success_url = get("CHECKOUT_SUCCESS_URL").unwrap_or_else(|| {
            format!(
                "{}/success.html?session_id={}",
                public_domain, CHECKOUT_SESSION_PLACEHOLDER
            )
        });
        if !success_url.contains(CHECKOUT_SESSION_PLACEHOLDER) {
            return Err(ConfigError::Invalid {
                name: "CHECKOUT_SUCCESS_URL",
                reason: format!("must contain {}", CHECKOUT_SESSION_PLACEHOLDER),
            });
        }
        let cancel_url =
            get("CHECKOUT_CANCEL_URL").unwrap_or_else(|| format!("{}/cancel.html", public_domain));
        let portal_return_url =
            get("PORTAL_RETURN_URL").unwrap_or_else(|| format!("{}/", public_domain));

        let billing_cycle_anchor = get("CHECKOUT_BILLING_CYCLE_ANCHOR")
            .map(|raw| parse_number(&raw, "CHECKOUT_BILLING_CYCLE_ANCHOR"))
            .transpose()?;
        let automatic_tax = match get("CHECKOUT_AUTOMATIC_TAX") {
            Some(raw) => parse_bool(&raw, "CHECKOUT_AUTOMATIC_TAX")?,
            None => true,
        };
        let allowed_lookup_keys = get("CHECKOUT_LOOKUP_KEYS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let default_lookup_key = get("CHECKOUT_DEFAULT_LOOKUP_KEY").unwrap_or_default();

        let session_secret = require("SESSION_SIGNING_SECRET")?;
        if session_secret.len() < MIN_SESSION_SECRET_LENGTH {
            return Err(ConfigError::SecretTooShort {
                actual: session_secret.len(),
                required: MIN_SESSION_SECRET_LENGTH,
            });
        }

        let auth_cookie_secure = match get("AUTH_COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw, "AUTH_COOKIE_SECURE")?,
            None => true,
        };

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let sentry_dsn = get("SENTRY_DSN")
            .map(|raw| {
                raw.trim()
                    .parse::<sentry::types::Dsn>()
                    .map_err(|e| ConfigError::Invalid {
                        name: "SENTRY_DSN",
                        reason: e.to_string(),
                    })
            })
            .transpose()?;

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Text,
            Some(f) if f == "text" => LogFormat::Text,
            Some(f) if f == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    reason: format!("expected text or json, got {}", other),
                })
            }
        };

        Ok(Config {
            bind_addr,
            stripe: StripeSettings {
                secret_key,
                webhook_secret,
                webhook_tolerance_secs,
            },
            checkout: CheckoutSettings {
                success_url,
                cancel_url,
                portal_return_url,
                billing_cycle_anchor,
                automatic_tax,
                allowed_lookup_keys,
                default_lookup_key,
            },
            session_secret,
            auth_cookie_secure,
            log_format,
            sentry_dsn,
        })
    }
}

fn parse_number(raw: &str, name: &'static str) -> Result<i64, ConfigError> {
    raw.trim().parse::<i64>().map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_bool(raw: &str, name: &'static str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got {}", other),
        }),
    }
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        bind_addr: DEFAULT_BIND_ADDR.parse().unwrap(),
        stripe: StripeSettings {
            secret_key: "sk_test_stub".into(),
            webhook_secret: "whsec_test_0123456789abcdef".into(),
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        },
        checkout: CheckoutSettings {
            success_url: format!(
                "https://shop.example.com/success.html?session_id={}",
                CHECKOUT_SESSION_PLACEHOLDER
            ),
            cancel_url: "https://shop.example.com/cancel.html".into(),
            portal_return_url: "https://shop.example.com/".into(),
            billing_cycle_anchor: Some(1_672_531_200),
            automatic_tax: true,
            allowed_lookup_keys: Vec::new(),
            default_lookup_key: "standard_monthly".into(),
        },
        session_secret: "0123456789abcdef0123456789ABCDEF".into(),
        auth_cookie_secure: true,
        log_format: LogFormat::Text,
        sentry_dsn: None,
    }
}
