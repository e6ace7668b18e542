//! Protected endpoint handler.
//!
//! Echoes the validated claims back to the caller.

use crate::auth::Claims;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `/protected`.
#[derive(Debug, Clone, Serialize)]
pub struct ProtectedResponse {
    pub message: &'static str,

    /// Claims exactly as they were in the token.
    pub token: Claims,
}

/// Handler for GET /protected
///
/// Requires valid authentication via the auth middleware.
///
/// ## Response
///
/// ```json
/// {
///   "message": "Protected endpoint",
///   "token": { "sub": "client_abc123", "exp": 1234567890 }
/// }
/// ```
#[instrument(skip_all, name = "gate.handlers.protected")]
pub async fn protected(Extension(claims): Extension<Claims>) -> Json<ProtectedResponse> {
    tracing::debug!(target: "gate.handlers.protected", "Returning token claims");

    Json(ProtectedResponse {
        message: "Protected endpoint",
        token: claims,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_protected_echoes_claims() {
        let raw = json!({"sub": "user123", "scope": "read", "custom": [1, 2]});
        let claims: Claims = serde_json::from_value(raw.clone()).unwrap();

        let Json(body) = protected(Extension(claims)).await;
        let json = serde_json::to_value(body).unwrap();

        assert_eq!(json["message"], "Protected endpoint");
        assert_eq!(json["token"], raw);
    }
}
