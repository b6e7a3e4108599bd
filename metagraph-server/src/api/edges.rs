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

//! Edge CRUD and listing.
//!
//! The vectorization side channel runs after the durable write commits;
//! its failures are logged and never surface to the caller, so the edge's
//! authoritative state is unaffected by the embedding or index services.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, warn};

use metagraph_core::{
    generate_id, merge_properties, now_rfc3339, Audit, Edge, PermissionLevel,
    DEFAULT_RELATIONSHIP_TYPE,
};
use metagraph_store::EdgeFilter;

use crate::api::{ApiError, AppState, RequestId};
use crate::auth::Principal;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateEdgeRequest {
    pub id: Option<String>,
    pub from_node: Option<String>,
    pub to_node: Option<String>,
    pub relationship_type: Option<String>,
    pub properties: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEdgeRequest {
    pub relationship_type: Option<String>,
    pub properties: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct EdgeListParams {
    /// Relationship type filter.
    #[serde(rename = "type")]
    pub relationship_type: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct EdgeListMetadata {
    pub org_id: String,
    pub total: usize,
    pub filters: Value,
}

#[derive(Debug, Serialize)]
pub struct EdgeListResponse {
    pub edges: Vec<Edge>,
    pub metadata: EdgeListMetadata,
}

#[derive(Debug, Serialize)]
pub struct DeleteEdgeResponse {
    pub deleted: String,
    pub org_id: String,
    pub timestamp: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /:org/edge
pub async fn create_edge(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path(org): Path<String>,
    Json(body): Json<CreateEdgeRequest>,
) -> Result<Json<Edge>, ApiError> {
    principal.require(&org, PermissionLevel::Write)?;

    let (Some(from_node), Some(to_node)) = (
        body.from_node.filter(|n| !n.is_empty()),
        body.to_node.filter(|n| !n.is_empty()),
    ) else {
        return Err(ApiError::BadRequest(
            "from_node and to_node are required".into(),
        ));
    };

    let edge = Edge {
        id: body
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_id),
        org_id: org.clone(),
        from_node,
        to_node,
        relationship_type: body
            .relationship_type
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_RELATIONSHIP_TYPE.to_string()),
        properties: body.properties.unwrap_or_else(|| json!({})),
        audit: Audit::new(&principal.sub, &principal.user_agent, &principal.client_ip),
    };

    let started = Instant::now();
    state
        .store
        .upsert_edge(&edge)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?;
    debug!(%org, id = %edge.id, elapsed_ms = started.elapsed().as_millis() as u64, "edge upserted");

    // Side channel, after the durable write. Best-effort by contract.
    if let Some(vectorizer) = &state.vectorizer {
        let started = Instant::now();
        match vectorizer.vectorize(&edge).await {
            Ok(true) => debug!(
                id = %edge.id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "edge vectorized"
            ),
            Ok(false) => {}
            Err(e) => warn!(id = %edge.id, "edge vectorization failed: {e}"),
        }
    }

    Ok(Json(edge))
}

/// GET /:org/edge/:id
pub async fn get_edge(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path((org, id)): Path<(String, String)>,
) -> Result<Json<Edge>, ApiError> {
    principal.require(&org, PermissionLevel::Read)?;

    let edge = state
        .store
        .get_edge(&org, &id)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?
        .ok_or_else(|| ApiError::NotFound("Edge not found".into()))?;
    Ok(Json(edge))
}

/// GET /:org/edges
pub async fn list_edges(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path(org): Path<String>,
    Query(params): Query<EdgeListParams>,
) -> Result<Json<EdgeListResponse>, ApiError> {
    principal.require(&org, PermissionLevel::Read)?;

    let filter = EdgeFilter {
        relationship_type: params.relationship_type.clone(),
        from_node: params.from.clone(),
        to_node: params.to.clone(),
        limit: params.limit.unwrap_or(100).max(1),
    };

    let started = Instant::now();
    let edges = state
        .store
        .list_edges(&org, &filter)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?;
    debug!(%org, rows = edges.len(), elapsed_ms = started.elapsed().as_millis() as u64, "edges listed");

    let metadata = EdgeListMetadata {
        org_id: org,
        total: edges.len(),
        filters: json!({
            "type": params.relationship_type,
            "from": params.from,
            "to": params.to,
        }),
    };
    Ok(Json(EdgeListResponse { edges, metadata }))
}

/// PUT|PATCH /:org/edge/:id — endpoints and creation metadata are
/// immutable; only the relationship type and properties move.
pub async fn update_edge(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path((org, id)): Path<(String, String)>,
    Json(body): Json<UpdateEdgeRequest>,
) -> Result<Json<Edge>, ApiError> {
    principal.require(&org, PermissionLevel::Write)?;

    let mut edge = state
        .store
        .get_edge(&org, &id)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?
        .ok_or_else(|| ApiError::NotFound("Edge not found".into()))?;

    if let Some(relationship_type) = body.relationship_type.filter(|r| !r.is_empty()) {
        edge.relationship_type = relationship_type;
    }
    if let Some(patch) = &body.properties {
        edge.properties = merge_properties(&edge.properties, patch);
    }
    edge.audit
        .touch(&principal.sub, &principal.user_agent, &principal.client_ip);

    state
        .store
        .upsert_edge(&edge)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?;
    debug!(%org, %id, "edge updated");

    Ok(Json(edge))
}

/// DELETE /:org/edge/:id
pub async fn delete_edge(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path((org, id)): Path<(String, String)>,
) -> Result<Json<DeleteEdgeResponse>, ApiError> {
    principal.require(&org, PermissionLevel::Write)?;

    let deleted = state
        .store
        .delete_edge(&org, &id)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?;
    if !deleted {
        return Err(ApiError::NotFound("Edge not found".into()));
    }
    debug!(%org, %id, "edge deleted");

    Ok(Json(DeleteEdgeResponse {
        deleted: id,
        org_id: org,
        timestamp: now_rfc3339(),
    }))
}
