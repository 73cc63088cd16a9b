//! Bearer-token gate applied in front of every non-public route.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use school_authz::TokenAuthority;

use crate::error::AppError;

/// Paths reachable without a token.
const PUBLIC_PREFIXES: &[&str] = &["/healthz", "/docs/", "/swagger-ui", "/api-docs/"];

/// State for [`require_bearer`].
#[derive(Clone)]
pub struct AuthGate {
    authority: Arc<TokenAuthority>,
}

impl AuthGate {
    pub fn new(authority: Arc<TokenAuthority>) -> Self {
        Self { authority }
    }

    fn is_public(path: &str) -> bool {
        PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
    }
}

/// Verify the `Authorization` header and stash the claims in the request
/// extensions for handlers to pick up with `Extension<Claims>`.
pub async fn require_bearer(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if AuthGate::is_public(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str())
        .transpose()
        .map_err(|_| AppError::unauthorized("authorization header is not valid text"))?;

    let claims = gate.authority.verify_header(header)?;
    tracing::debug!(sub = %claims.sub, role = claims.role.as_str(), "request authenticated");

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docs_and_health_are_public() {
        assert!(AuthGate::is_public("/healthz"));
        assert!(AuthGate::is_public("/swagger-ui/index.html"));
        assert!(AuthGate::is_public("/docs/openapi.json"));
        assert!(!AuthGate::is_public("/api/books"));
        assert!(!AuthGate::is_public("/library/return/abc"));
    }
}
