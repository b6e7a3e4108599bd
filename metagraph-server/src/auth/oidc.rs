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

//! OIDC token verification and the authorization-code callback.
//!
//! The discovery document is fetched once per process; JWKS is cached and
//! refreshed after [`JWKS_REFRESH`]. Concurrent refreshes are tolerated,
//! the last fetch wins. Verification failures of any kind surface as the
//! single stable `Invalid authentication token` response.

use axum::{
    extract::Query,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use metagraph_core::PermissionSet;

use super::AuthError;
use crate::config::OidcConfig;

/// JWKS cache lifetime.
const JWKS_REFRESH: Duration = Duration::from_secs(600);

/// Tolerated clock skew between this host and the IdP.
const CLOCK_SKEW_LEEWAY_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub jwks_uri: String,
    pub token_endpoint: String,
}

struct CachedJwks {
    set: JwkSet,
    fetched_at: Instant,
}

/// Claims extracted from a verified token.
#[derive(Debug, Clone)]
pub struct VerifiedClaims {
    pub sub: String,
    pub email: String,
    pub permissions: PermissionSet,
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    permissions: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

/// Verifies bearer tokens against the IdP's JWKS and runs the
/// authorization-code exchange for the browser flow.
pub struct OidcVerifier {
    http: reqwest::Client,
    discovery_url: String,
    client_id: String,
    client_secret: Option<String>,
    discovery: RwLock<Option<DiscoveryDocument>>,
    jwks: RwLock<Option<CachedJwks>>,
}

impl OidcVerifier {
    pub fn new(config: &OidcConfig) -> anyhow::Result<Self> {
        let discovery_url = config
            .discovery_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("OIDC discovery URL is not configured"))?;
        let client_id = config
            .client_id
            .clone()
            .ok_or_else(|| anyhow::anyhow!("OIDC client id is not configured"))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            discovery_url,
            client_id,
            client_secret: config.client_secret.clone(),
            discovery: RwLock::new(None),
            jwks: RwLock::new(None),
        })
    }

    async fn discovery(&self) -> Result<DiscoveryDocument, AuthError> {
        if let Some(doc) = self.discovery.read().await.as_ref() {
            return Ok(doc.clone());
        }

        let doc: DiscoveryDocument = self
            .http
            .get(&self.discovery_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                tracing::warn!("OIDC discovery fetch failed: {e}");
                AuthError::InvalidToken
            })?
            .json()
            .await
            .map_err(|e| {
                tracing::warn!("OIDC discovery parse failed: {e}");
                AuthError::InvalidToken
            })?;

        *self.discovery.write().await = Some(doc.clone());
        tracing::info!(issuer = %doc.issuer, "OIDC discovery document cached");
        Ok(doc)
    }

    async fn jwks(&self, force_refresh: bool) -> Result<JwkSet, AuthError> {
        if !force_refresh {
            if let Some(cached) = self.jwks.read().await.as_ref() {
                if cached.fetched_at.elapsed() < JWKS_REFRESH {
                    return Ok(cached.set.clone());
                }
            }
        }

        let discovery = self.discovery().await?;
        let set: JwkSet = self
            .http
            .get(&discovery.jwks_uri)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                tracing::warn!("JWKS fetch failed: {e}");
                AuthError::InvalidToken
            })?
            .json()
            .await
            .map_err(|e| {
                tracing::warn!("JWKS parse failed: {e}");
                AuthError::InvalidToken
            })?;

        *self.jwks.write().await = Some(CachedJwks {
            set: set.clone(),
            fetched_at: Instant::now(),
        });
        tracing::debug!(keys = set.keys.len(), "JWKS cache refreshed");
        Ok(set)
    }

    /// Verify signature, issuer, audience, and expiry; extract the
    /// principal claims. Unknown `kid`s trigger one forced JWKS refresh
    /// to pick up key rotation.
    pub async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!("token header rejected: {e}");
            AuthError::InvalidToken
        })?;
        let kid = header.kid.ok_or(AuthError::InvalidToken)?;

        let mut jwks = self.jwks(false).await?;
        let jwk = match jwks.find(&kid) {
            Some(jwk) => jwk.clone(),
            None => {
                jwks = self.jwks(true).await?;
                jwks.find(&kid).cloned().ok_or_else(|| {
                    tracing::debug!(%kid, "no JWKS key for kid");
                    AuthError::InvalidToken
                })?
            }
        };

        let discovery = self.discovery().await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            tracing::warn!("unusable JWK: {e}");
            AuthError::InvalidToken
        })?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&discovery.issuer]);
        validation.set_audience(&[&self.client_id]);
        validation.leeway = CLOCK_SKEW_LEEWAY_SECS;

        let data = decode::<RawClaims>(token, &key, &validation).map_err(|e| {
            tracing::debug!("token rejected: {e}");
            AuthError::InvalidToken
        })?;

        let email = data
            .claims
            .email
            .filter(|e| !e.is_empty())
            .ok_or(AuthError::InvalidToken)?;
        if data.claims.sub.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let permissions = data
            .claims
            .permissions
            .map(|claim| PermissionSet::from_claim(&claim))
            .unwrap_or_default();

        Ok(VerifiedClaims {
            sub: data.claims.sub,
            email,
            permissions,
        })
    }

    /// Exchange an authorization code for an id_token.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, AuthError> {
        let discovery = self.discovery().await?;

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", &self.client_id),
            ("redirect_uri", redirect_uri),
        ];
        if let Some(secret) = &self.client_secret {
            params.push(("client_secret", secret));
        }

        let response: TokenResponse = self
            .http
            .post(&discovery.token_endpoint)
            .form(&params)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                tracing::warn!("code exchange failed: {e}");
                AuthError::InvalidToken
            })?
            .json()
            .await
            .map_err(|e| {
                tracing::warn!("token endpoint response unparseable: {e}");
                AuthError::InvalidToken
            })?;

        response.id_token.ok_or_else(|| {
            tracing::warn!("token endpoint returned no id_token");
            AuthError::InvalidToken
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
}

/// `GET /auth/callback?code=...` — complete the browser login: exchange
/// the code, verify the id_token, set the session cookie, go home.
pub async fn oidc_callback(
    Extension(verifier): Extension<Arc<OidcVerifier>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AuthError> {
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing authorization code" })),
        )
            .into_response());
    };

    let redirect_uri = callback_redirect_uri(&headers);
    let id_token = verifier.exchange_code(&code, &redirect_uri).await?;

    // Verification also enforces the sub/email requirement.
    verifier.verify(&id_token).await?;

    let cookie = format!("session={id_token}; HttpOnly; Path=/; Secure; SameSite=Lax");
    let mut response = Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, "/")
        .body(axum::body::Body::empty())
        .unwrap_or_default();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    Ok(response)
}

/// The redirect_uri this deployment registered with the IdP: scheme is
/// https except for loopback hosts.
fn callback_redirect_uri(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = if host.starts_with("localhost") || host.starts_with("127.0.0.1") {
        "http"
    } else {
        "https"
    };
    format!("{scheme}://{host}/auth/callback")
}
