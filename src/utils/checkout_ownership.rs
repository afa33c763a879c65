//! Proof that a browser started a given checkout session.
//!
//! Creating a checkout session sets a cookie carrying the session id and an
//! HMAC over it. Opening the billing portal for that session requires the same
//! cookie, so a caller cannot reach another customer's portal by guessing ids.
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const CHECKOUT_COOKIE: &str = "checkout_session";
const COOKIE_TTL_HOURS: i64 = 24;

fn compute_tag(secret: &str, session_id: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(b"checkout-session:");
    mac.update(session_id.as_bytes());
    BASE64_URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

pub fn sign_session_id(secret: &str, session_id: &str) -> String {
    format!("{}.{}", session_id, compute_tag(secret, session_id))
}

/// True when `cookie_value` was issued by us for exactly `session_id`.
pub fn verify_session_cookie(secret: &str, cookie_value: &str, session_id: &str) -> bool {
    let Some((cookie_session, tag)) = cookie_value.rsplit_once('.') else {
        return false;
    };
    if cookie_session != session_id {
        return false;
    }
    let expected = compute_tag(secret, session_id);
    expected.as_bytes().ct_eq(tag.as_bytes()).into()
}

pub fn ownership_cookie(secret: &str, session_id: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((CHECKOUT_COOKIE, sign_session_id(secret, session_id)))
        .path("/")
        .http_only(true)
        .secure(secure)
        // Lax so the cookie survives the top-level redirect back from Stripe
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(COOKIE_TTL_HOURS))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789ABCDEF";

    #[test]
    fn signed_value_verifies_for_same_session() {
        let value = sign_session_id(SECRET, "cs_test_123");
        assert!(value.starts_with("cs_test_123."));
        assert!(verify_session_cookie(SECRET, &value, "cs_test_123"));
    }

    #[test]
    fn signed_value_does_not_transfer_to_another_session() {
        let value = sign_session_id(SECRET, "cs_test_123");
        assert!(!verify_session_cookie(SECRET, &value, "cs_test_456"));
    }

    #[test]
    fn forged_or_foreign_tags_are_rejected() {
        let foreign = sign_session_id("another-secret-another-secret-xx", "cs_test_123");
        assert!(!verify_session_cookie(SECRET, &foreign, "cs_test_123"));
        assert!(!verify_session_cookie(SECRET, "cs_test_123.AAAA", "cs_test_123"));
        assert!(!verify_session_cookie(SECRET, "cs_test_123", "cs_test_123"));
        assert!(!verify_session_cookie(SECRET, "", "cs_test_123"));
    }

    #[test]
    fn cookie_attributes() {
        let cookie = ownership_cookie(SECRET, "cs_test_1", true);
        assert_eq!(cookie.name(), CHECKOUT_COOKIE);
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert!(verify_session_cookie(SECRET, cookie.value(), "cs_test_1"));
    }
}
