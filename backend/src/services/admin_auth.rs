//! Admin Authentication
//!
//! Guards the manual recompute trigger. Admin callers present a bearer
//! token whose SHA-256 digest must match the configured `ADMIN_TOKEN_HASH`.
//! When no hash is configured every admin request is rejected.

use std::future::{Ready, ready};

use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::AppError;

/// Errors that can occur during admin authentication
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing or malformed bearer token")]
    MissingToken,

    #[error("Invalid admin token")]
    InvalidToken,

    #[error("Admin access is not configured")]
    NotConfigured,
}

/// Admin token verifier
#[derive(Debug, Clone, Default)]
pub struct AdminAuth {
    /// Hex-encoded SHA-256 of the admin token
    token_hash: Option<String>,
}

impl AdminAuth {
    pub fn new(token_hash: impl Into<String>) -> Self {
        Self {
            token_hash: Some(token_hash.into().trim().to_lowercase()),
        }
    }

    /// Verifier that rejects every token
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn from_hash(token_hash: Option<String>) -> Self {
        token_hash.map(Self::new).unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        self.token_hash.is_some()
    }

    /// Hash a token using SHA256
    pub fn hash_token(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }

    /// Check a presented token against the configured hash
    pub fn verify(&self, token: &str) -> Result<(), AuthError> {
        let expected = self.token_hash.as_deref().ok_or(AuthError::NotConfigured)?;
        if constant_time_eq(&Self::hash_token(token), expected) {
            Ok(())
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

/// Constant-time string comparison
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Extract Bearer token from Authorization header
///
/// Expected format: "Bearer <token>"
fn extract_bearer_token(req: &HttpRequest) -> Option<String> {
    let auth_header = req.headers().get("Authorization")?;
    let auth_str = auth_header.to_str().ok()?;

    // Check for "Bearer " prefix (case-insensitive)
    if auth_str.len() > 7 && auth_str[..7].eq_ignore_ascii_case("Bearer ") {
        Some(auth_str[7..].to_string())
    } else {
        None
    }
}

/// An authenticated admin caller.
///
/// Taking this as a handler parameter rejects the request with
/// `401 UNAUTHORIZED` unless it carries a valid admin bearer token.
#[derive(Debug, Clone)]
pub struct AdminCaller {
    /// Leading characters of the token hash, safe to log
    pub fingerprint: String,
}

impl FromRequest for AdminCaller {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AdminCaller, AppError> {
    let Some(admin_auth) = req.app_data::<web::Data<AdminAuth>>() else {
        tracing::error!("AdminAuth not configured in app data");
        return Err(AppError::Internal(
            "Authentication service not configured".to_string(),
        ));
    };

    let token = extract_bearer_token(req).ok_or_else(|| {
        tracing::debug!("Missing or invalid Authorization header");
        AppError::Unauthorized(AuthError::MissingToken.to_string())
    })?;

    admin_auth.verify(&token).map_err(|e| {
        tracing::warn!("Rejected admin request: {}", e);
        AppError::Unauthorized(e.to_string())
    })?;

    let mut fingerprint = AdminAuth::hash_token(&token);
    fingerprint.truncate(8);
    Ok(AdminCaller { fingerprint })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    const TOKEN: &str = "s3cret-admin-token";

    fn auth() -> AdminAuth {
        AdminAuth::new(AdminAuth::hash_token(TOKEN))
    }

    #[test]
    fn test_token_hashing() {
        let hash = AdminAuth::hash_token(TOKEN);

        // SHA256 = 32 bytes = 64 hex chars
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, AdminAuth::hash_token(TOKEN));
        assert_ne!(hash, AdminAuth::hash_token("other-token"));
    }

    #[test]
    fn test_verify() {
        let auth = auth();
        assert!(auth.is_enabled());
        assert_eq!(auth.verify(TOKEN), Ok(()));
        assert_eq!(auth.verify("wrong"), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_configured_hash_is_case_insensitive() {
        let auth = AdminAuth::new(AdminAuth::hash_token(TOKEN).to_uppercase());
        assert_eq!(auth.verify(TOKEN), Ok(()));
    }

    #[test]
    fn test_disabled_rejects_everything() {
        let auth = AdminAuth::from_hash(None);
        assert!(!auth.is_enabled());
        assert_eq!(auth.verify(TOKEN), Err(AuthError::NotConfigured));
        assert_eq!(AdminAuth::disabled().verify(""), Err(AuthError::NotConfigured));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("hello", "hello"));
        assert!(!constant_time_eq("hello", "world"));
        assert!(!constant_time_eq("hello", "hell"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn test_extract_bearer_token() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer my-token-123"))
            .to_http_request();
        assert_eq!(extract_bearer_token(&req), Some("my-token-123".to_string()));

        let req = TestRequest::default()
            .insert_header(("Authorization", "bearer my-token-456"))
            .to_http_request();
        assert_eq!(extract_bearer_token(&req), Some("my-token-456".to_string()));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert_eq!(extract_bearer_token(&req), None);

        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer "))
            .to_http_request();
        assert_eq!(extract_bearer_token(&req), None);

        let req = TestRequest::default().to_http_request();
        assert_eq!(extract_bearer_token(&req), None);
    }

    #[test]
    fn test_authenticate() {
        let req = TestRequest::default()
            .app_data(web::Data::new(auth()))
            .insert_header(("Authorization", format!("Bearer {TOKEN}")))
            .to_http_request();
        let caller = authenticate(&req).unwrap();
        assert_eq!(caller.fingerprint.len(), 8);

        let req = TestRequest::default()
            .app_data(web::Data::new(auth()))
            .insert_header(("Authorization", "Bearer nope"))
            .to_http_request();
        assert!(matches!(authenticate(&req), Err(AppError::Unauthorized(_))));

        let req = TestRequest::default()
            .app_data(web::Data::new(auth()))
            .to_http_request();
        assert!(matches!(authenticate(&req), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_authenticate_without_app_data() {
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {TOKEN}")))
            .to_http_request();
        assert!(matches!(authenticate(&req), Err(AppError::Internal(_))));
    }
}
