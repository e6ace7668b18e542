//! Public endpoint handler.

use axum::Json;
use serde::Serialize;

/// Body returned by every message-only endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Handler for GET /
///
/// Requires no credential.
pub async fn public_root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Hello World - Public Endpoint",
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_public_root_body() {
        let Json(body) = public_root().await;
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json, serde_json::json!({"message": "Hello World - Public Endpoint"}));
    }
}
