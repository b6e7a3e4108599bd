// Copyright 2025 Metagraph (https://github.com/metagraph)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Authentication gate.
//!
//! Every graph route passes through [`auth_middleware`]: bearer token (or
//! `session` cookie) → JWKS signature verification → [`Principal`]
//! extension. Authorization is per-handler: each handler declares the
//! level its route requires via [`Principal::require`].

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;

use metagraph_core::{PermissionLevel, PermissionSet};

pub mod oidc;
pub use oidc::{oidc_callback, OidcVerifier, VerifiedClaims};

/// Authentication error. Messages are stable strings clients match on.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication token")]
    MissingToken,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    Forbidden,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingToken | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// The authenticated actor attached to each authorized request, together
/// with the transport metadata that feeds record audit fields.
#[derive(Debug, Clone)]
pub struct Principal {
    pub sub: String,
    pub email: String,
    pub permissions: PermissionSet,
    pub client_ip: String,
    pub user_agent: String,
}

impl Principal {
    pub fn from_claims(claims: VerifiedClaims, headers: &HeaderMap) -> Self {
        Self {
            sub: claims.sub,
            email: claims.email,
            permissions: claims.permissions,
            client_ip: client_ip(headers),
            user_agent: header_str(headers, header::USER_AGENT.as_str())
                .unwrap_or("unknown")
                .to_string(),
        }
    }

    /// Gate an org-scoped operation on the required level.
    pub fn require(&self, org: &str, level: PermissionLevel) -> Result<(), AuthError> {
        if self.permissions.allows(org, level) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

/// Bearer token from the `Authorization` header, falling back to the
/// `session` cookie set by the OIDC callback.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| session_cookie(headers))
}

/// Token from the `Authorization: Bearer` header only.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = header_str(headers, header::AUTHORIZATION.as_str())?;
    let token = auth.strip_prefix("Bearer ")?;
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Token from the `session` cookie only. Routes serving the browser
/// session require this credential specifically.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = header_str(headers, header::COOKIE.as_str())?;
    for cookie in cookies.split(';') {
        let cookie = cookie.trim();
        if let Some(token) = cookie.strip_prefix("session=") {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    None
}

/// First hop of `x-forwarded-for`, then `x-real-ip`, else "unknown".
fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    header_str(headers, "x-real-ip")
        .unwrap_or("unknown")
        .to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Per-request authentication: extract, verify, attach the principal.
pub async fn auth_middleware(
    Extension(verifier): Extension<Arc<OidcVerifier>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_token(req.headers()).ok_or(AuthError::MissingToken)?;
    run_authenticated(&verifier, &token, req, next).await
}

/// Authentication for the browser-session routes: only the `session`
/// cookie qualifies, a bearer header alone is rejected.
pub async fn session_auth_middleware(
    Extension(verifier): Extension<Arc<OidcVerifier>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = session_cookie(req.headers()).ok_or(AuthError::MissingToken)?;
    run_authenticated(&verifier, &token, req, next).await
}

async fn run_authenticated(
    verifier: &OidcVerifier,
    token: &str,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = verifier.verify(token).await?;
    let principal = Principal::from_claims(claims, req.headers());

    tracing::debug!(sub = %principal.sub, "request authenticated");
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
