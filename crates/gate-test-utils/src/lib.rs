//! # Gate Test Utilities
//!
//! Shared test utilities for Bearer Gate.
//!
//! This crate provides:
//! - Deterministic RSA keypairs and JWKS documents (`crypto_fixtures`)
//! - Fluent claim/token builders (`token_builders`)
//! - Server test harness (`TestGateServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gate_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let key = primary_keypair();
//!     let server = TestGateServer::spawn(jwks_json(&[&key])).await?;
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/protected", server.url()))
//!         .bearer_auth(TestTokenBuilder::new().sign_with(&key)?)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
