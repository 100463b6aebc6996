//! Inspection of the bearer token's embedded claims.
//!
//! Tokens are JWTs signed by the server. The client never verifies the
//! signature; it only reads the payload segment to learn the expiry and the
//! identity the token was issued for.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use std::error::Error as StdError;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenClaims {
    /// Seconds since the epoch. Some issuers emit fractional values.
    #[serde(default)]
    pub exp: Option<f64>,
    #[serde(default, deserialize_with = "crate::api::models::lenient_id_opt")]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
}

impl TokenClaims {
    /// A token without an `exp` claim never expires.
    pub fn is_expired(&self, now_epoch_s: i64) -> bool {
        matches!(self.exp, Some(exp) if exp < now_epoch_s as f64)
    }
}

#[derive(Debug)]
pub enum TokenError {
    Malformed,
    Encoding(base64::DecodeError),
    Payload(serde_json::Error),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "token has no payload segment"),
            TokenError::Encoding(err) => write!(f, "token payload is not base64url: {err}"),
            TokenError::Payload(err) => write!(f, "token payload is not valid JSON: {err}"),
        }
    }
}

impl StdError for TokenError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TokenError::Malformed => None,
            TokenError::Encoding(err) => Some(err),
            TokenError::Payload(err) => Some(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenStatus {
    Valid(TokenClaims),
    Expired,
    Invalid,
}

pub fn current_unix_epoch_s() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or_default()
}

pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next()) {
        (Some(_), Some(payload)) if !payload.is_empty() => payload,
        _ => return Err(TokenError::Malformed),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(TokenError::Encoding)?;
    serde_json::from_slice(&bytes).map_err(TokenError::Payload)
}

/// Classify a stored token. Undecodable tokens are `Invalid`, which callers
/// treat the same as no token at all.
pub fn inspect_token(token: &str, now_epoch_s: i64) -> TokenStatus {
    match decode_claims(token) {
        Ok(claims) if claims.is_expired(now_epoch_s) => TokenStatus::Expired,
        Ok(claims) => TokenStatus::Valid(claims),
        Err(_) => TokenStatus::Invalid,
    }
}

#[cfg(test)]
pub(crate) fn encode_test_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{body}.signature")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_access_token_claims() {
        let token = encode_test_token(&json!({
            "token_type": "access",
            "exp": 1_900_000_000,
            "user_id": 42,
            "email": "a@b.com"
        }));

        let claims = decode_claims(&token).expect("claims should decode");
        assert_eq!(claims.exp, Some(1_900_000_000.0));
        assert_eq!(claims.user_id, Some(42));
        assert_eq!(claims.email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn expiry_is_strictly_before_now() {
        let claims = TokenClaims {
            exp: Some(100.0),
            ..TokenClaims::default()
        };
        assert!(claims.is_expired(101));
        assert!(!claims.is_expired(100));
        assert!(!TokenClaims::default().is_expired(i64::MAX));
    }

    #[test]
    fn inspect_classifies_tokens() {
        let expired = encode_test_token(&json!({"exp": 10}));
        let live = encode_test_token(&json!({"exp": 1_000, "user_id": 1}));

        assert_eq!(inspect_token(&expired, 500), TokenStatus::Expired);
        assert!(matches!(inspect_token(&live, 500), TokenStatus::Valid(_)));
        assert_eq!(inspect_token("garbage", 500), TokenStatus::Invalid);
        assert_eq!(inspect_token("a.!!!.c", 500), TokenStatus::Invalid);
    }

    #[test]
    fn fractional_expiry_is_compared_numerically() {
        let token = encode_test_token(&json!({"exp": 1_900_000_000.5, "user_id": 7}));

        assert!(matches!(
            inspect_token(&token, 1_900_000_000),
            TokenStatus::Valid(_)
        ));
        assert_eq!(inspect_token(&token, 1_900_000_001), TokenStatus::Expired);
    }

    #[test]
    fn only_the_payload_segment_is_required() {
        let body = URL_SAFE_NO_PAD.encode(br#"{"user_id":3}"#);
        assert_eq!(decode_claims(&format!("h.{body}")).unwrap().user_id, Some(3));

        let err = decode_claims("no-dots-here").unwrap_err();
        assert!(matches!(err, TokenError::Malformed));
        assert_eq!(err.to_string(), "token has no payload segment");
        assert!(matches!(decode_claims("h..s"), Err(TokenError::Malformed)));
    }

    #[test]
    fn padded_payloads_are_accepted() {
        let body = base64::engine::general_purpose::URL_SAFE.encode(br#"{"exp":50}"#);
        assert!(body.ends_with('='));
        let token = format!("h.{body}.s");
        assert_eq!(decode_claims(&token).unwrap().exp, Some(50.0));
    }

    #[test]
    fn non_json_payload_is_reported() {
        let body = URL_SAFE_NO_PAD.encode(b"hello");
        let err = decode_claims(&format!("h.{body}.s")).unwrap_err();
        assert!(matches!(err, TokenError::Payload(_)));
    }
}
