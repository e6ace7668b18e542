//! Health check handler.
//!
//! `/health` is a liveness probe: it answers as long as the process serves
//! requests and never touches the JWKS endpoint.

/// Liveness probe handler.
///
/// Returns a simple "OK" response to indicate the process is running.
pub async fn health_check() -> &'static str {
    "OK"
}
