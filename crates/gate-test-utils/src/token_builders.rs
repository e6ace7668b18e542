//! Builder patterns for test data construction
//!
//! Provides fluent APIs for creating test token claims and signing them.

use crate::crypto_fixtures::{FixtureError, TestKeypair};
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for creating test JWT claims
///
/// Defaults to a subject, an empty scope, `iat` now and `exp` one hour out.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("alice")
///     .with_scope("read write")
///     .expires_in(3600)
///     .sign_with(&primary_keypair())?;
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!("test-subject"));
        claims.insert("scope".to_string(), json!(""));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        claims.insert("iat".to_string(), json!(now.timestamp()));
        Self { claims }
    }

    /// Set the subject (user/service)
    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set the scope (space-separated)
    pub fn with_scope(self, scope: &str) -> Self {
        self.with_claim("scope", json!(scope))
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(self, seconds: i64) -> Self {
        self.with_claim("exp", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Set `nbf` in seconds from now
    pub fn not_before_in(self, seconds: i64) -> Self {
        self.with_claim("nbf", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Set issued-at timestamp
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", json!(timestamp))
    }

    /// Set the audience
    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Set an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Build and sign with RS256 under the keypair's key ID
    pub fn sign_with(self, key: &TestKeypair) -> Result<String, FixtureError> {
        key.sign(&self.build())
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto_fixtures::primary_keypair;

    #[test]
    fn test_builder_creates_valid_claims() {
        let claims = TestTokenBuilder::new()
            .for_user("alice")
            .with_scope("read")
            .build();

        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["scope"], "read");
        assert!(claims["exp"].as_i64().unwrap() > Utc::now().timestamp());
    }

    #[test]
    fn test_builder_default() {
        let claims = TestTokenBuilder::default().build();
        assert_eq!(claims["sub"], "test-subject");
        assert!(claims.get("aud").is_none());
        assert!(claims.get("nbf").is_none());
    }

    #[test]
    fn test_builder_expired_and_not_yet_valid() {
        let claims = TestTokenBuilder::new()
            .expires_in(-60)
            .not_before_in(120)
            .build();
        let now = Utc::now().timestamp();

        assert!(claims["exp"].as_i64().unwrap() < now);
        assert!(claims["nbf"].as_i64().unwrap() > now);
    }

    #[test]
    fn test_builder_without_removes_claim() {
        let claims = TestTokenBuilder::new().without("exp").build();
        assert!(claims.get("exp").is_none());
    }

    #[test]
    fn test_builder_custom_claims() {
        let claims = TestTokenBuilder::new()
            .with_audience("api")
            .with_claim("roles", json!(["admin"]))
            .build();

        assert_eq!(claims["aud"], "api");
        assert_eq!(claims["roles"][0], "admin");
    }

    #[test]
    fn test_sign_with_produces_three_part_token() {
        let token = TestTokenBuilder::new()
            .sign_with(&primary_keypair())
            .unwrap();
        assert_eq!(token.split('.').count(), 3);
    }
}
