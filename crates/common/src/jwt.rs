//! JWT utilities shared across Bearer Gate crates.
//!
//! This module provides the pieces of token handling that do not need a key:
//! - Size limits for DoS prevention
//! - Leeway bounds for time-based claims
//! - Unverified header inspection (declared `alg` and `kid`)
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing returned from this module is trusted: the header is read only to
//!   pick a key out of a trusted JWKS. The signing algorithm is never taken
//!   from it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::extract_header;
//!
//! // Key ID for JWKS lookup
//! let header = extract_header(token)?;
//! let jwk = jwks.find(&header.kid)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// - Typical RS256 access tokens are 700-1500 bytes
/// - 8KB allows generous custom claims while bounding base64/JSON work
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default leeway applied to `exp` and `nbf` checks.
///
/// Zero: a token is expired the second its `exp` passes.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(0);

/// Maximum configurable leeway (10 minutes).
pub const MAX_LEEWAY: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting an unverified JWT.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("Token exceeds maximum size of {} bytes", MAX_JWT_SIZE_BYTES)]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("Token is not a well-formed JWT")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("Token header has no key identifier")]
    MissingKid,
}

// =============================================================================
// Header Types
// =============================================================================

/// The parts of a JWT header that can be read before verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedHeader {
    /// Declared algorithm. Informational only; verification pins its own.
    pub alg: Option<String>,

    /// Key identifier used to select a key from the JWKS.
    pub kid: String,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    alg: Option<serde_json::Value>,
    #[serde(default)]
    kid: Option<serde_json::Value>,
}

// =============================================================================
// Functions
// =============================================================================

/// Read the JWT header without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - The token MUST still be verified after fetching the key
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Token format invalid (wrong structure, bad base64, invalid JSON)
/// - `MissingKid` - Header `kid` absent, empty, or not a string
pub fn extract_header(token: &str) -> Result<UnverifiedHeader, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    // Empty kid is treated as missing
    let kid = header
        .kid
        .as_ref()
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    let alg = header
        .alg
        .as_ref()
        .and_then(|v| v.as_str())
        .map(ToString::to_string);

    Ok(UnverifiedHeader { alg, kid })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn token_with_header(header: &str) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        format!("{header_b64}.payload.signature")
    }

    fn kid_of(token: &str) -> Result<String, JwtValidationError> {
        extract_header(token).map(|header| header.kid)
    }

    // -------------------------------------------------------------------------
    // Constants Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_default_leeway_is_zero() {
        assert_eq!(DEFAULT_LEEWAY, Duration::ZERO);
    }

    #[test]
    fn test_max_leeway_is_10_minutes() {
        assert_eq!(MAX_LEEWAY, Duration::from_secs(600));
    }

    // -------------------------------------------------------------------------
    // extract_header Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_extract_header_reads_alg_and_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"signing-key-1"}"#);

        let header = extract_header(&token).unwrap();
        assert_eq!(header.alg.as_deref(), Some("RS256"));
        assert_eq!(header.kid, "signing-key-1");
    }

    #[test]
    fn test_extract_header_without_alg() {
        let token = token_with_header(r#"{"kid":"k"}"#);

        let header = extract_header(&token).unwrap();
        assert!(header.alg.is_none());
        assert_eq!(header.kid, "k");
    }

    #[test]
    fn test_extract_header_reports_attacker_alg_verbatim() {
        // The header is informational; callers decide what to do with alg
        let token = token_with_header(r#"{"alg":"none","kid":"k"}"#);

        let header = extract_header(&token).unwrap();
        assert_eq!(header.alg.as_deref(), Some("none"));
    }

    // -------------------------------------------------------------------------
    // extract_header kid and framing Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_extract_header_valid_token() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"test-key-01"}"#);

        let result = kid_of(&token);
        assert_eq!(result.unwrap(), "test-key-01");
    }

    #[test]
    fn test_extract_header_missing_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT"}"#);

        let result = kid_of(&token);
        assert!(matches!(result, Err(JwtValidationError::MissingKid)));
    }

    #[test]
    fn test_extract_header_empty_kid() {
        let token = token_with_header(r#"{"alg":"RS256","kid":""}"#);

        let result = kid_of(&token);
        assert!(matches!(result, Err(JwtValidationError::MissingKid)));
    }

    #[test]
    fn test_extract_header_non_string_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":12345}"#);

        let result = kid_of(&token);
        assert!(matches!(result, Err(JwtValidationError::MissingKid)));
    }

    #[test]
    fn test_extract_header_null_kid() {
        let token = token_with_header(r#"{"alg":"RS256","kid":null}"#);

        let result = kid_of(&token);
        assert!(matches!(result, Err(JwtValidationError::MissingKid)));
    }

    #[test]
    fn test_extract_header_malformed_token() {
        assert!(matches!(
            kid_of("not-a-jwt"),
            Err(JwtValidationError::MalformedToken)
        ));
        assert!(matches!(
            kid_of("only.two"),
            Err(JwtValidationError::MalformedToken)
        ));
        assert!(matches!(
            kid_of("not.a.valid.jwt"),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_extract_header_empty_token() {
        let result = kid_of("");
        assert!(matches!(result, Err(JwtValidationError::MalformedToken)));
    }

    #[test]
    fn test_extract_header_invalid_base64() {
        let result = kid_of("!!!invalid!!!.payload.signature");
        assert!(matches!(result, Err(JwtValidationError::MalformedToken)));
    }

    #[test]
    fn test_extract_header_invalid_json() {
        let token = token_with_header("not-json");

        let result = kid_of(&token);
        assert!(matches!(result, Err(JwtValidationError::MalformedToken)));
    }

    #[test]
    fn test_extract_header_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        let result = kid_of(&oversized);
        assert!(matches!(result, Err(JwtValidationError::TokenTooLarge)));
    }

    #[test]
    fn test_extract_header_at_size_limit() {
        let header = r#"{"alg":"RS256","typ":"JWT","kid":"key"}"#;
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        // Need 3 parts: header.payload.signature (2 dots)
        let remaining = MAX_JWT_SIZE_BYTES - header_b64.len() - 2;
        let payload_len = remaining / 2;
        let sig_len = remaining - payload_len;
        let token = format!(
            "{}.{}.{}",
            header_b64,
            "a".repeat(payload_len),
            "b".repeat(sig_len)
        );

        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);

        let result = kid_of(&token);
        assert_eq!(result.unwrap(), "key");
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        assert_eq!(
            JwtValidationError::TokenTooLarge.to_string(),
            "Token exceeds maximum size of 8192 bytes"
        );
        assert_eq!(
            JwtValidationError::MalformedToken.to_string(),
            "Token is not a well-formed JWT"
        );
        assert_eq!(
            JwtValidationError::MissingKid.to_string(),
            "Token header has no key identifier"
        );
    }
}
