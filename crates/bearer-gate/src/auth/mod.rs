//! Bearer token authentication.
//!
//! # Components
//!
//! - `jwks` - JWKS cache for the identity provider's signing keys
//! - `jwt` - RS256 token validation against a fetched JWKS
//! - `claims` - Claims of a validated token
//! - `gate` - Request-level authentication built on the two above

pub mod claims;
pub mod gate;
pub mod jwks;
pub mod jwt;

pub use claims::Claims;
pub use gate::Authenticator;
pub use jwks::{JwksCache, JwksResponse};
pub use jwt::{validate_token, ValidationPolicy};
