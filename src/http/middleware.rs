//! Identity verification for socket upgrades

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Claims issued by the auth service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject
    pub sub: String,
    /// Display identity used for matches
    #[serde(default)]
    pub username: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    #[serde(default)]
    pub iat: u64,
}

impl JwtClaims {
    /// The identity a connection acts under
    pub fn identity(&self) -> &str {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.sub)
    }
}

/// Verify an HS256 token and extract claims
pub fn verify_jwt(token: &str, secret: &str) -> Result<JwtClaims, AuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::InvalidToken);
    };

    let message = format!("{}.{}", header_b64, payload_b64);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(message.as_bytes());

    let provided_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::InvalidToken)?;
    // constant-time comparison
    mac.verify_slice(&provided_signature)
        .map_err(|_| AuthError::InvalidToken)?;

    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::InvalidToken)?;
    let claims: JwtClaims =
        serde_json::from_slice(&payload_json).map_err(|_| AuthError::InvalidToken)?;

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    if claims.exp < now {
        return Err(AuthError::TokenExpired);
    }
    if claims.identity().is_empty() {
        return Err(AuthError::MissingIdentity);
    }

    Ok(claims)
}

/// Resolve the optional `?token=` parameter to an identity
pub fn authenticate(token: Option<&str>, secret: &str) -> Result<String, AuthError> {
    let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::MissingToken)?;
    let claims = verify_jwt(token, secret)?;
    Ok(claims.identity().to_string())
}

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token carries no identity")]
    MissingIdentity,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(claims: &serde_json::Value, secret: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", header, payload).as_bytes());
        let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}.{}", header, payload, sig)
    }

    fn future() -> u64 {
        chrono::Utc::now().timestamp() as u64 + 3600
    }

    #[test]
    fn username_claim_wins() {
        let token = sign(
            &serde_json::json!({"sub": "42", "username": "ana", "exp": future()}),
            "secret",
        );
        assert_eq!(authenticate(Some(token.as_str()), "secret").unwrap(), "ana");
    }

    #[test]
    fn falls_back_to_subject() {
        let token = sign(&serde_json::json!({"sub": "bo", "exp": future()}), "secret");
        assert_eq!(authenticate(Some(token.as_str()), "secret").unwrap(), "bo");
    }

    #[test]
    fn rejects_bad_tokens() {
        let token = sign(&serde_json::json!({"sub": "bo", "exp": future()}), "secret");
        assert!(matches!(
            authenticate(Some(token.as_str()), "other"),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(authenticate(None, "secret"), Err(AuthError::MissingToken)));
        assert!(matches!(
            authenticate(Some("a.b"), "secret"),
            Err(AuthError::InvalidToken)
        ));

        let expired = sign(&serde_json::json!({"sub": "bo", "exp": 1}), "secret");
        assert!(matches!(
            authenticate(Some(expired.as_str()), "secret"),
            Err(AuthError::TokenExpired)
        ));
    }
}
