//! Bearer Gate Service Library
//!
//! Bearer-token verification for HTTP services: the JWT in an
//! `Authorization: Bearer` header is checked against signing keys published
//! at a JWKS endpoint before a protected route runs.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/gate.rs -> auth/jwks.rs (cache)
//!                                                     -> auth/jwt.rs  (validation)
//! ```
//!
//! # Modules
//!
//! - `auth` - JWKS cache, token validation, and the authentication gate
//! - `config` - Service configuration from environment
//! - `errors` - Error types and the 401 response mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Auth and HTTP metrics middleware
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
