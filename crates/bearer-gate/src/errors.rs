//! Bearer Gate error types.
//!
//! `AuthError` is the internal taxonomy: every way a request can fail to
//! authenticate, from configuration through key retrieval to token checks.
//! At the request boundary every `AuthError` is flattened into
//! [`Unauthorized`], which always maps to 401 and exposes only a message.
//! The original kind stays attached for logging and metrics.

use crate::config::ConfigError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Realm advertised in `WWW-Authenticate`.
pub const AUTH_REALM: &str = "bearer-gate";

/// Authentication failure, before flattening.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The JWKS endpoint is not configured.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Network, status, or parse failure talking to the JWKS endpoint.
    #[error("Failed to fetch JWKS: {0}")]
    JwksFetch(String),

    /// Token could not be parsed far enough to read its header.
    #[error("Malformed token: {0}")]
    TokenMalformed(String),

    /// No key in the JWKS carries the token's `kid`.
    #[error("Key not found in JWKS")]
    KeyNotFound(String),

    /// Signature or claim verification failed.
    #[error("Token verification failed: {0}")]
    TokenInvalid(String),

    /// No `Authorization: Bearer <token>` header.
    #[error("Missing or invalid Authorization header")]
    MissingCredential,
}

impl AuthError {
    /// Bounded label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Configuration(_) => "configuration",
            AuthError::JwksFetch(_) => "jwks_fetch",
            AuthError::TokenMalformed(_) => "token_malformed",
            AuthError::KeyNotFound(_) => "key_not_found",
            AuthError::TokenInvalid(_) => "token_invalid",
            AuthError::MissingCredential => "missing_credential",
        }
    }

    /// True when the failure is on our side rather than the client's.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, AuthError::Configuration(_) | AuthError::JwksFetch(_))
    }
}

/// The single error the authentication boundary returns.
///
/// Always rendered as 401 with a descriptive message.
#[derive(Debug, Error)]
#[error("Unauthorized: {message}")]
pub struct Unauthorized {
    message: String,
    #[source]
    source: AuthError,
}

impl From<AuthError> for Unauthorized {
    fn from(source: AuthError) -> Self {
        let message = match &source {
            AuthError::MissingCredential => source.to_string(),
            other => format!("Invalid token: {}", other),
        };
        Self { message, source }
    }
}

impl Unauthorized {
    /// Client-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The underlying failure.
    pub fn auth_error(&self) -> &AuthError {
        &self.source
    }

    /// Shorthand for `auth_error().kind()`.
    pub fn kind(&self) -> &'static str {
        self.source.kind()
    }

    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        401
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        if self.source.is_server_fault() {
            tracing::warn!(
                target: "gate.errors",
                kind = self.kind(),
                error = %self.source,
                "Authentication failed on server side"
            );
        } else {
            tracing::debug!(
                target: "gate.errors",
                kind = self.kind(),
                error = %self.source,
                "Authentication rejected"
            );
        }

        // RFC 6750: no error code when credentials were simply absent
        let challenge = match self.source {
            AuthError::MissingCredential => format!("Bearer realm=\"{}\"", AUTH_REALM),
            _ => format!("Bearer realm=\"{}\", error=\"invalid_token\"", AUTH_REALM),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: "UNAUTHORIZED".to_string(),
                message: self.message,
            },
        };

        let mut response = (StatusCode::UNAUTHORIZED, Json(error_response)).into_response();

        if let Ok(header_value) = HeaderValue::from_str(&challenge) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, header_value);
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    // Helper function to read the response body as JSON
    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_auth_errors() {
        assert_eq!(
            AuthError::Configuration(ConfigError::MissingEnvVar("JWKS_URI".to_string()))
                .to_string(),
            "Configuration error: Missing required environment variable: JWKS_URI"
        );
        assert_eq!(
            AuthError::JwksFetch("HTTP 503".to_string()).to_string(),
            "Failed to fetch JWKS: HTTP 503"
        );
        assert_eq!(
            AuthError::TokenMalformed("bad header".to_string()).to_string(),
            "Malformed token: bad header"
        );
        assert_eq!(
            AuthError::KeyNotFound("kid-1".to_string()).to_string(),
            "Key not found in JWKS"
        );
        assert_eq!(
            AuthError::TokenInvalid("ExpiredSignature".to_string()).to_string(),
            "Token verification failed: ExpiredSignature"
        );
        assert_eq!(
            AuthError::MissingCredential.to_string(),
            "Missing or invalid Authorization header"
        );
    }

    #[test]
    fn test_kinds_are_distinct() {
        let kinds = [
            AuthError::Configuration(ConfigError::MissingEnvVar("X".to_string())).kind(),
            AuthError::JwksFetch(String::new()).kind(),
            AuthError::TokenMalformed(String::new()).kind(),
            AuthError::KeyNotFound(String::new()).kind(),
            AuthError::TokenInvalid(String::new()).kind(),
            AuthError::MissingCredential.kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }

    #[test]
    fn test_server_fault_classification() {
        assert!(AuthError::JwksFetch("down".to_string()).is_server_fault());
        assert!(
            AuthError::Configuration(ConfigError::MissingEnvVar("X".to_string())).is_server_fault()
        );
        assert!(!AuthError::MissingCredential.is_server_fault());
        assert!(!AuthError::KeyNotFound("k".to_string()).is_server_fault());
    }

    #[test]
    fn test_unauthorized_message_for_missing_credential() {
        let err = Unauthorized::from(AuthError::MissingCredential);
        assert_eq!(err.message(), "Missing or invalid Authorization header");
        assert_eq!(err.kind(), "missing_credential");
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_unauthorized_message_prefixes_token_errors() {
        let err = Unauthorized::from(AuthError::KeyNotFound("kid-9".to_string()));
        assert_eq!(err.message(), "Invalid token: Key not found in JWKS");
        assert!(matches!(err.auth_error(), AuthError::KeyNotFound(kid) if kid == "kid-9"));
    }

    #[test]
    fn test_unauthorized_keeps_source() {
        use std::error::Error as _;

        let err = Unauthorized::from(AuthError::JwksFetch("timeout".to_string()));
        let source = err.source().expect("source should be set");
        assert_eq!(source.to_string(), "Failed to fetch JWKS: timeout");
    }

    #[tokio::test]
    async fn test_into_response_invalid_token() {
        let error = Unauthorized::from(AuthError::TokenInvalid("InvalidSignature".to_string()));
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response
            .headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(
            www_auth,
            "Bearer realm=\"bearer-gate\", error=\"invalid_token\""
        );

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "UNAUTHORIZED");
        assert_eq!(
            body_json["error"]["message"],
            "Invalid token: Token verification failed: InvalidSignature"
        );
    }

    #[tokio::test]
    async fn test_into_response_missing_credential() {
        let response = Unauthorized::from(AuthError::MissingCredential).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_auth = response.headers().get("WWW-Authenticate").unwrap();
        assert_eq!(www_auth, "Bearer realm=\"bearer-gate\"");

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(
            body_json["error"]["message"],
            "Missing or invalid Authorization header"
        );
    }

    #[tokio::test]
    async fn test_into_response_configuration_error_is_still_401() {
        let error = Unauthorized::from(AuthError::Configuration(ConfigError::MissingEnvVar(
            "JWKS_URI".to_string(),
        )));
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "UNAUTHORIZED");
    }
}
