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

pub mod edges;
pub mod graph;
pub mod nodes;
pub mod orgs;
pub mod snapshot;
pub mod traverse;

use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use metagraph_store::GraphStore;

use crate::auth::AuthError;
use crate::cache::NodeCache;
use crate::snapshots::SnapshotStore;
use crate::vector::EdgeVectorizer;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: GraphStore,
    pub cache: NodeCache,
    pub snapshots: SnapshotStore,
    /// Present only when the vector index is configured; edge writes
    /// without it skip the side channel entirely.
    pub vectorizer: Option<Arc<EdgeVectorizer>>,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("{message}")]
    Internal { message: String, request_id: String },
}

impl ApiError {
    /// Wrap a dependency failure, tagging it with the request id that the
    /// response body and the log line share.
    pub fn internal(request_id: &RequestId, err: impl std::fmt::Display) -> Self {
        tracing::error!(request_id = %request_id.0, "internal error: {err}");
        Self::Internal {
            message: "Internal server error".to_string(),
            request_id: request_id.0.clone(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => ApiError::Unauthorized("Missing authentication token"),
            AuthError::InvalidToken => ApiError::Unauthorized("Invalid authentication token"),
            AuthError::Forbidden => ApiError::Forbidden,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Insufficient permissions" })),
            )
                .into_response(),
            ApiError::Internal {
                message,
                request_id,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message, "requestId": request_id })),
            )
                .into_response(),
        }
    }
}

/// Correlation id assigned to every request; echoed as `x-request-id` and
/// carried in 500 bodies.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Outermost middleware: assign the request id, open the request-scoped
/// span, time the request, stamp the response header.
pub async fn request_context(mut req: Request, next: Next) -> Response {
    let request_id = RequestId::new();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(request_id.clone());

    let span =
        tracing::info_span!("request", request_id = %request_id.0, %method, %path);
    let started = Instant::now();
    let mut response = next.run(req).instrument(span).await;

    tracing::debug!(
        request_id = %request_id.0,
        %method,
        %path,
        status = %response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id.0) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Unauthenticated liveness probe.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
