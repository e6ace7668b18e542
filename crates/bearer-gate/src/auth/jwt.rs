//! Token validation against a fetched JWKS.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (via `common::jwt`)
//! - Only RS256 is accepted; the header's `alg` never selects the algorithm
//! - `exp` and `nbf` are checked when present, with the configured leeway
//! - Audience is checked only when the policy names one

use crate::auth::claims::Claims;
use crate::auth::jwks::{Jwk, JwksResponse};
use crate::config::Config;
use crate::errors::AuthError;
use common::jwt::{extract_header, JwtValidationError, DEFAULT_LEEWAY};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::time::Duration;

/// The only algorithm tokens may be signed with.
pub const PINNED_ALGORITHM: Algorithm = Algorithm::RS256;

/// Claim checks applied after the signature verifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Tolerance for `exp` and `nbf`.
    pub leeway: Duration,

    /// When set, `aud` must contain this value. `None` disables the check.
    pub audience: Option<String>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            leeway: DEFAULT_LEEWAY,
            audience: None,
        }
    }
}

impl ValidationPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            leeway: config.jwt_leeway,
            audience: config.expected_audience().map(ToString::to_string),
        }
    }

    fn to_validation(&self) -> Validation {
        let mut validation = Validation::new(PINNED_ALGORITHM);
        // exp is checked if present but not required
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = self.leeway.as_secs();

        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        validation
    }
}

/// Validate `token` against `jwks` and return its claims.
///
/// Pure: no I/O, no caching.
///
/// # Security Checks
///
/// 1. Size check and unverified header parse
/// 2. Key selection by `kid` (first match in JWKS order)
/// 3. Key shape: RSA with modulus and exponent, RS256 if `alg` is declared
/// 4. RS256 signature verification
/// 5. `exp`, `nbf` and (optionally) `aud`
/// 6. `exp` and `nbf`, when present, are non-negative numbers
///
/// # Errors
///
/// - `AuthError::TokenMalformed` - header unreadable or without `kid`
/// - `AuthError::KeyNotFound` - no key with the token's `kid`
/// - `AuthError::TokenInvalid` - unusable key, bad signature, or failed claim check
pub fn validate_token(
    token: &str,
    jwks: &JwksResponse,
    policy: &ValidationPolicy,
) -> Result<Claims, AuthError> {
    let header = extract_header(token).map_err(|e| {
        tracing::debug!(target: "gate.auth.jwt", error = %e, "Token header rejected");
        malformed(&e)
    })?;

    let jwk = jwks.find(&header.kid).ok_or_else(|| {
        tracing::debug!(
            target: "gate.auth.jwt",
            kid = %header.kid,
            available = jwks.keys.len(),
            "No matching key in JWKS"
        );
        AuthError::KeyNotFound(header.kid.clone())
    })?;

    let decoding_key = decoding_key(jwk)?;

    let token_data =
        decode::<Claims>(token, &decoding_key, &policy.to_validation()).map_err(|e| {
            tracing::debug!(
                target: "gate.auth.jwt",
                kid = %header.kid,
                header_alg = header.alg.as_deref().unwrap_or("-"),
                error = %e,
                "Token verification failed"
            );
            AuthError::TokenInvalid(e.to_string())
        })?;

    for name in TIME_CLAIMS {
        check_time_claim(&token_data.claims, name)?;
    }

    tracing::debug!(target: "gate.auth.jwt", kid = %header.kid, "Token validated successfully");
    Ok(token_data.claims)
}

/// Claims the time checks read.
const TIME_CLAIMS: [&str; 2] = ["exp", "nbf"];

/// A present time claim must be a non-negative number.
///
/// The decoder skips `exp`/`nbf` values it cannot read as unsigned integers,
/// so strings and negative numbers would otherwise pass unchecked.
fn check_time_claim(claims: &Claims, name: &str) -> Result<(), AuthError> {
    let Some(value) = claims.get(name) else {
        return Ok(());
    };

    match value.as_f64() {
        Some(seconds) if seconds >= 0.0 => Ok(()),
        _ => {
            tracing::debug!(target: "gate.auth.jwt", claim = name, "Unusable time claim");
            Err(AuthError::TokenInvalid(format!(
                "{} must be a non-negative number",
                name
            )))
        }
    }
}

fn malformed(error: &JwtValidationError) -> AuthError {
    AuthError::TokenMalformed(error.to_string())
}

/// Build an RS256 verification key from a JWK.
fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    if jwk.kty != "RSA" {
        tracing::warn!(target: "gate.auth.jwt", kty = %jwk.kty, "Unexpected JWK key type");
        return Err(AuthError::TokenInvalid(format!(
            "key type {} cannot verify RS256",
            jwk.kty
        )));
    }
    if let Some(alg) = &jwk.alg {
        if alg != "RS256" {
            tracing::warn!(target: "gate.auth.jwt", alg = %alg, "Unexpected JWK algorithm");
            return Err(AuthError::TokenInvalid(format!(
                "key is published for {}, not RS256",
                alg
            )));
        }
    }

    let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
        tracing::error!(target: "gate.auth.jwt", kid = ?jwk.kid, "JWK missing RSA components");
        return Err(AuthError::TokenInvalid(
            "key is missing RSA components".to_string(),
        ));
    };

    DecodingKey::from_rsa_components(n, e).map_err(|err| {
        tracing::error!(target: "gate.auth.jwt", error = %err, "Invalid RSA key encoding");
        AuthError::TokenInvalid(format!("invalid key material: {}", err))
    })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use gate_test_utils::{
        jwks_json, primary_keypair, secondary_keypair, sign_hs256, TestTokenBuilder,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn jwks(value: Value) -> JwksResponse {
        serde_json::from_value(value).unwrap()
    }

    fn primary_jwks() -> JwksResponse {
        jwks(jwks_json(&[&primary_keypair()]))
    }

    fn expect_invalid(result: Result<Claims, AuthError>) -> String {
        match result {
            Err(AuthError::TokenInvalid(reason)) => reason,
            other => panic!("Expected TokenInvalid, got {:?}", other),
        }
    }

    // =========================================================================
    // Happy path
    // =========================================================================

    #[test]
    fn test_valid_token_returns_claims_unchanged() {
        let claims = TestTokenBuilder::new()
            .for_user("alice")
            .with_scope("read write")
            .with_claim("tenant", json!({"id": 7}))
            .build();
        let token = primary_keypair().sign(&claims).unwrap();

        let validated = validate_token(&token, &primary_jwks(), &ValidationPolicy::default())
            .expect("token should validate");

        assert_eq!(serde_json::to_value(&validated).unwrap(), claims);
        assert_eq!(validated.get("sub").unwrap(), "alice");
    }

    #[test]
    fn test_token_without_exp_is_accepted() {
        let token = TestTokenBuilder::new()
            .without("exp")
            .sign_with(&primary_keypair())
            .unwrap();

        let claims =
            validate_token(&token, &primary_jwks(), &ValidationPolicy::default()).unwrap();
        assert!(claims.get("exp").is_none());
    }

    #[test]
    fn test_selects_key_by_kid_among_several() {
        let jwks = jwks(jwks_json(&[&secondary_keypair(), &primary_keypair()]));

        let token = TestTokenBuilder::new()
            .sign_with(&primary_keypair())
            .unwrap();
        assert!(validate_token(&token, &jwks, &ValidationPolicy::default()).is_ok());

        let token = TestTokenBuilder::new()
            .sign_with(&secondary_keypair())
            .unwrap();
        assert!(validate_token(&token, &jwks, &ValidationPolicy::default()).is_ok());
    }

    #[test]
    fn test_first_matching_kid_wins() {
        // Both entries claim the primary kid; only the first is consulted
        let impostor = secondary_keypair().with_kid(primary_keypair().kid());
        let jwks = jwks(jwks_json(&[&impostor, &primary_keypair()]));

        let token = TestTokenBuilder::new()
            .sign_with(&primary_keypair())
            .unwrap();

        expect_invalid(validate_token(&token, &jwks, &ValidationPolicy::default()));
    }

    // =========================================================================
    // Header and key selection failures
    // =========================================================================

    #[test]
    fn test_malformed_token() {
        let result = validate_token("not-a-jwt", &primary_jwks(), &ValidationPolicy::default());
        assert!(matches!(result, Err(AuthError::TokenMalformed(_))));
    }

    #[test]
    fn test_token_without_kid_is_malformed() {
        let token = primary_keypair()
            .sign_with_header(&TestTokenBuilder::new().build(), None)
            .unwrap();

        let result = validate_token(&token, &primary_jwks(), &ValidationPolicy::default());
        assert!(matches!(result, Err(AuthError::TokenMalformed(_))));
    }

    #[test]
    fn test_oversized_token_is_malformed() {
        let token = "a".repeat(common::jwt::MAX_JWT_SIZE_BYTES + 1);
        let result = validate_token(&token, &primary_jwks(), &ValidationPolicy::default());
        assert!(matches!(result, Err(AuthError::TokenMalformed(_))));
    }

    #[test]
    fn test_unknown_kid() {
        let token = TestTokenBuilder::new()
            .sign_with(&secondary_keypair())
            .unwrap();

        let result = validate_token(&token, &primary_jwks(), &ValidationPolicy::default());
        assert!(
            matches!(&result, Err(AuthError::KeyNotFound(kid)) if kid == "test-key-2"),
            "Expected KeyNotFound, got {:?}",
            result
        );
    }

    #[test]
    fn test_empty_jwks() {
        let token = TestTokenBuilder::new()
            .sign_with(&primary_keypair())
            .unwrap();

        let result = validate_token(
            &token,
            &jwks(json!({"keys": []})),
            &ValidationPolicy::default(),
        );
        assert!(matches!(result, Err(AuthError::KeyNotFound(_))));
    }

    // =========================================================================
    // Signature and algorithm failures
    // =========================================================================

    #[test]
    fn test_tampered_payload_fails_signature() {
        let token = TestTokenBuilder::new()
            .for_user("alice")
            .sign_with(&primary_keypair())
            .unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"mallory"}"#);
        let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        let reason = expect_invalid(validate_token(
            &tampered,
            &primary_jwks(),
            &ValidationPolicy::default(),
        ));
        assert!(reason.contains("InvalidSignature"), "got: {}", reason);
    }

    #[test]
    fn test_token_signed_by_other_key_under_known_kid() {
        let forged = secondary_keypair().with_kid(primary_keypair().kid());
        let token = TestTokenBuilder::new().sign_with(&forged).unwrap();

        expect_invalid(validate_token(
            &token,
            &primary_jwks(),
            &ValidationPolicy::default(),
        ));
    }

    #[test]
    fn test_hs256_with_public_key_as_secret_is_rejected() {
        let key = primary_keypair();
        let token = sign_hs256(
            &TestTokenBuilder::new().build(),
            key.kid(),
            key.public_key_pem().as_bytes(),
        )
        .unwrap();

        let reason = expect_invalid(validate_token(
            &token,
            &primary_jwks(),
            &ValidationPolicy::default(),
        ));
        assert!(reason.contains("InvalidAlgorithm"), "got: {}", reason);
    }

    #[test]
    fn test_alg_none_is_rejected() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","kid":"test-key-1"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"mallory"}"#);
        let token = format!("{}.{}.", header, payload);

        let result = validate_token(&token, &primary_jwks(), &ValidationPolicy::default());
        assert!(result.is_err());
    }

    // =========================================================================
    // Key shape failures
    // =========================================================================

    #[test]
    fn test_non_rsa_key_is_rejected() {
        let jwks = jwks(json!({"keys": [
            {"kty": "OKP", "kid": "test-key-1", "crv": "Ed25519", "x": "abc"}
        ]}));
        let token = TestTokenBuilder::new()
            .sign_with(&primary_keypair())
            .unwrap();

        let reason = expect_invalid(validate_token(&token, &jwks, &ValidationPolicy::default()));
        assert!(reason.contains("OKP"));
    }

    #[test]
    fn test_key_published_for_other_alg_is_rejected() {
        let mut jwk = primary_keypair().jwk();
        jwk["alg"] = json!("RS512");
        let jwks = jwks(json!({"keys": [jwk]}));
        let token = TestTokenBuilder::new()
            .sign_with(&primary_keypair())
            .unwrap();

        expect_invalid(validate_token(&token, &jwks, &ValidationPolicy::default()));
    }

    #[test]
    fn test_key_without_alg_is_usable() {
        let mut jwk = primary_keypair().jwk();
        jwk.as_object_mut().unwrap().remove("alg");
        let jwks = jwks(json!({"keys": [jwk]}));
        let token = TestTokenBuilder::new()
            .sign_with(&primary_keypair())
            .unwrap();

        assert!(validate_token(&token, &jwks, &ValidationPolicy::default()).is_ok());
    }

    #[test]
    fn test_key_missing_modulus_is_rejected() {
        let mut jwk = primary_keypair().jwk();
        jwk.as_object_mut().unwrap().remove("n");
        let jwks = jwks(json!({"keys": [jwk]}));
        let token = TestTokenBuilder::new()
            .sign_with(&primary_keypair())
            .unwrap();

        let reason = expect_invalid(validate_token(&token, &jwks, &ValidationPolicy::default()));
        assert!(reason.contains("missing RSA components"));
    }

    // =========================================================================
    // Time-based claims
    // =========================================================================

    #[test]
    fn test_expired_token_is_rejected() {
        let token = TestTokenBuilder::new()
            .expires_in(-120)
            .sign_with(&primary_keypair())
            .unwrap();

        let reason = expect_invalid(validate_token(
            &token,
            &primary_jwks(),
            &ValidationPolicy::default(),
        ));
        assert!(reason.contains("ExpiredSignature"), "got: {}", reason);
    }

    #[test]
    fn test_expired_token_within_leeway_is_accepted() {
        let token = TestTokenBuilder::new()
            .expires_in(-30)
            .sign_with(&primary_keypair())
            .unwrap();
        let policy = ValidationPolicy {
            leeway: Duration::from_secs(120),
            ..ValidationPolicy::default()
        };

        assert!(validate_token(&token, &primary_jwks(), &policy).is_ok());
    }

    #[test]
    fn test_non_numeric_or_negative_time_claims_are_rejected() {
        let cases = [
            ("exp", json!(-5)),
            ("exp", json!(-0.5)),
            ("exp", json!("1000")),
            ("exp", json!(null)),
            ("nbf", json!("x")),
            ("nbf", json!(-5)),
            ("nbf", json!({"at": 0})),
        ];

        for (name, value) in cases {
            let token = TestTokenBuilder::new()
                .with_claim(name, value.clone())
                .sign_with(&primary_keypair())
                .unwrap();

            let result = validate_token(&token, &primary_jwks(), &ValidationPolicy::default());
            assert!(
                matches!(result, Err(AuthError::TokenInvalid(_))),
                "{}={} should be rejected, got {:?}",
                name,
                value,
                result
            );
        }
    }

    #[test]
    fn test_numeric_time_claims_in_range_are_accepted() {
        let builder = TestTokenBuilder::new();
        let exp = builder.clone().build()["exp"].as_i64().unwrap();
        let token = builder
            .with_claim("exp", json!(exp as f64 + 0.5))
            .with_claim("nbf", json!(0))
            .sign_with(&primary_keypair())
            .unwrap();

        assert!(validate_token(&token, &primary_jwks(), &ValidationPolicy::default()).is_ok());
    }

    #[test]
    fn test_not_yet_valid_token_is_rejected() {
        let token = TestTokenBuilder::new()
            .not_before_in(300)
            .sign_with(&primary_keypair())
            .unwrap();

        let reason = expect_invalid(validate_token(
            &token,
            &primary_jwks(),
            &ValidationPolicy::default(),
        ));
        assert!(reason.contains("ImmatureSignature"), "got: {}", reason);
    }

    // =========================================================================
    // Audience
    // =========================================================================

    #[test]
    fn test_audience_ignored_by_default() {
        let token = TestTokenBuilder::new()
            .with_audience("someone-else")
            .sign_with(&primary_keypair())
            .unwrap();

        assert!(validate_token(&token, &primary_jwks(), &ValidationPolicy::default()).is_ok());
    }

    #[test]
    fn test_audience_enforced_when_configured() {
        let policy = ValidationPolicy {
            audience: Some("bearer-gate-api".to_string()),
            ..ValidationPolicy::default()
        };

        let matching = TestTokenBuilder::new()
            .with_audience("bearer-gate-api")
            .sign_with(&primary_keypair())
            .unwrap();
        assert!(validate_token(&matching, &primary_jwks(), &policy).is_ok());

        let in_list = TestTokenBuilder::new()
            .with_claim("aud", json!(["other", "bearer-gate-api"]))
            .sign_with(&primary_keypair())
            .unwrap();
        assert!(validate_token(&in_list, &primary_jwks(), &policy).is_ok());

        let mismatched = TestTokenBuilder::new()
            .with_audience("someone-else")
            .sign_with(&primary_keypair())
            .unwrap();
        let reason = expect_invalid(validate_token(&mismatched, &primary_jwks(), &policy));
        assert!(reason.contains("InvalidAudience"), "got: {}", reason);
    }

    #[test]
    fn test_policy_from_config() {
        let vars = HashMap::from([
            ("JWT_LEEWAY_SECONDS".to_string(), "30".to_string()),
            ("JWT_VERIFY_AUDIENCE".to_string(), "true".to_string()),
            ("JWT_AUDIENCE".to_string(), "api".to_string()),
        ]);
        let config = Config::from_vars(&vars).unwrap();

        let policy = ValidationPolicy::from_config(&config);
        assert_eq!(policy.leeway, Duration::from_secs(30));
        assert_eq!(policy.audience.as_deref(), Some("api"));
    }

    #[test]
    fn test_default_policy() {
        let policy = ValidationPolicy::default();
        assert_eq!(policy.leeway, Duration::ZERO);
        assert!(policy.audience.is_none());
    }
}
