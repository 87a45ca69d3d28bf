//! Auth presence middleware.
//!
//! A presence check only, applied uniformly as a transport interceptor: when
//! OIDC is required the request must carry a bearer token header; when mTLS
//! is required the connection must have presented verified peer certificates
//! (surfaced by the TLS acceptor as a [`PeerVerified`] request extension).
//! No token validation and no certificate verification happen here.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::KairosError;

use super::error_response;

/// Which presence checks to enforce.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthConfig {
    /// Require a `Authorization: Bearer ...` header.
    pub require_oidc: bool,

    /// Require verified peer certificates on the connection.
    pub require_mtls: bool,
}

/// Marker extension inserted by the TLS acceptor when the peer presented
/// verified certificates.
#[derive(Debug, Clone, Copy)]
pub struct PeerVerified;

/// Axum middleware enforcing [`AuthConfig`].
pub async fn require_auth(
    State(config): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Response {
    if config.require_oidc && !has_bearer_token(&request) {
        return error_response(&KairosError::unauthorized("missing bearer token"));
    }
    if config.require_mtls && request.extensions().get::<PeerVerified>().is_none() {
        return error_response(&KairosError::unauthorized(
            "peer did not present verified certificates",
        ));
    }
    next.run(request).await
}

fn has_bearer_token(request: &Request) -> bool {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| !token.is_empty())
}
