//! Request authentication: bearer credential in, claims or rejection out.

use crate::auth::claims::Claims;
use crate::auth::jwks::JwksCache;
use crate::auth::jwt::{validate_token, ValidationPolicy};
use crate::errors::{AuthError, Unauthorized};
use crate::observability::metrics;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::sync::Arc;
use tracing::instrument;

/// Case-sensitive scheme prefix, including the separating space.
const BEARER_PREFIX: &str = "Bearer ";

/// Turns an `Authorization` header into validated claims.
pub struct Authenticator {
    jwks_cache: Arc<JwksCache>,
    policy: ValidationPolicy,
}

impl Authenticator {
    pub fn new(jwks_cache: Arc<JwksCache>, policy: ValidationPolicy) -> Self {
        Self { jwks_cache, policy }
    }

    pub fn jwks_cache(&self) -> &Arc<JwksCache> {
        &self.jwks_cache
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Authenticate a request by its headers.
    ///
    /// Header problems are rejected before the JWKS cache is consulted.
    ///
    /// # Errors
    ///
    /// Every failure is returned as [`Unauthorized`]; the underlying
    /// [`AuthError`] stays attached.
    #[instrument(skip_all, name = "gate.auth.authenticate")]
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, Unauthorized> {
        match self.try_authenticate(headers).await {
            Ok(claims) => {
                metrics::record_auth_attempt("success", "none");
                tracing::debug!(target: "gate.auth.gate", "Request authenticated");
                Ok(claims)
            }
            Err(e) => {
                metrics::record_auth_attempt("failure", e.kind());
                tracing::debug!(
                    target: "gate.auth.gate",
                    kind = e.kind(),
                    error = %e,
                    "Request rejected"
                );
                Err(Unauthorized::from(e))
            }
        }
    }

    async fn try_authenticate(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingCredential)?;
        let jwks = self.jwks_cache.fetch_jwks().await?;
        validate_token(token, &jwks, &self.policy)
    }
}

/// Token after the exact `Bearer ` prefix, untrimmed.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
}
