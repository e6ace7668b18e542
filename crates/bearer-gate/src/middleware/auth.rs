//! Authentication middleware for protected routes.
//!
//! Runs the [`Authenticator`] on the request headers and injects the
//! validated [`Claims`](crate::auth::Claims) into request extensions.

use crate::auth::Authenticator;
use crate::errors::Unauthorized;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Gate shared by every protected route.
    pub authenticator: Arc<Authenticator>,
}

/// Authentication middleware.
///
/// # Response
///
/// - Returns 401 Unauthorized if the credential is missing or invalid
/// - Continues to next handler with `Claims` in extensions otherwise
#[instrument(skip_all, name = "gate.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, Unauthorized> {
    let claims = state.authenticator.authenticate(req.headers()).await?;

    tracing::debug!(target: "gate.middleware.auth", path = %req.uri().path(), "Access granted");

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
