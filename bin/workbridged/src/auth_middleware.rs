//! Bearer-token middleware.
//!
//! Extracts the JWT from `Authorization: Bearer <token>`, verifies it
//! against the account module's token service, and provides the
//! authenticated `Subject` to downstream handlers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use workbridge_account::token::TokenService;
use workbridge_core::ServiceError;

/// Middleware that authenticates every non-public request.
///
/// On success the `Subject` is stored in request extensions; handlers
/// take it with `Extension(subject)`.
pub async fn auth_middleware(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let path = request.uri().path().to_string();

    if is_public_path(&path) {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".into()))?;

    let subject = tokens.verify(token)?;
    request.extensions_mut().insert(subject);

    Ok(next.run(request).await)
}

/// Paths that work without a token: account entry points plus the
/// system probes.
fn is_public_path(path: &str) -> bool {
    matches!(
        path,
        "/health"
            | "/version"
            | "/account/workers/register"
            | "/account/workers/login"
            | "/account/workers/forgot-password"
            | "/account/enterprises/register"
            | "/account/enterprises/login"
    )
}
