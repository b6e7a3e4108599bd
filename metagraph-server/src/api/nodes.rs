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

//! Node CRUD and listing.
//!
//! Reads go through the cache; every write lands in the durable store
//! first and refreshes the cache afterwards. Creation is an UPSERT, so a
//! retried `POST` with a client-supplied id converges instead of
//! conflicting.

use axum::{
    extract::{Path, Query, State},
    http::HeaderValue,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::debug;

use metagraph_core::{
    generate_id, merge_properties, now_rfc3339, Audit, Node, PermissionLevel, DEFAULT_NODE_TYPE,
};
use metagraph_store::{NodeFilter, SortOrder};

use crate::api::{ApiError, AppState, RequestId};
use crate::auth::Principal;
use crate::cache::{CacheOutcome, X_NODE_CACHE};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateNodeRequest {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub properties: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNodeRequest {
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub properties: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct NodeListParams {
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_records: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub next_page: Option<u32>,
    pub prev_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct NodeListResponse {
    pub data: Vec<Node>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct DeleteNodeResponse {
    pub deleted: String,
    pub deleted_edges: u64,
    pub timestamp: String,
}

/// Node body plus the `X-Node-Cache` header.
#[derive(Debug)]
pub struct CachedNodeResponse {
    pub cache: CacheOutcome,
    pub node: Node,
}

impl IntoResponse for CachedNodeResponse {
    fn into_response(self) -> Response {
        let mut response = Json(&self.node).into_response();
        response.headers_mut().insert(
            X_NODE_CACHE,
            HeaderValue::from_static(self.cache.as_str()),
        );
        response
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /:org/nodes/:id
pub async fn get_node(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path((org, id)): Path<(String, String)>,
) -> Result<CachedNodeResponse, ApiError> {
    principal.require(&org, PermissionLevel::Read)?;

    if let Some(node) = state.cache.get(&org, &id) {
        debug!(%org, %id, "node cache hit");
        return Ok(CachedNodeResponse {
            cache: CacheOutcome::Hit,
            node,
        });
    }

    let started = Instant::now();
    let node = state
        .store
        .get_node(&org, &id)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?
        .ok_or_else(|| ApiError::NotFound("Node not found".into()))?;
    debug!(%org, %id, elapsed_ms = started.elapsed().as_millis() as u64, "node fetched from store");

    state.cache.insert(&node);
    Ok(CachedNodeResponse {
        cache: CacheOutcome::Miss,
        node,
    })
}

/// GET /:org/nodes
pub async fn list_nodes(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path(org): Path<String>,
    Query(params): Query<NodeListParams>,
) -> Result<Json<NodeListResponse>, ApiError> {
    principal.require(&org, PermissionLevel::Read)?;

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(100).max(1);
    let filter = NodeFilter {
        node_type: params.node_type,
        created_by: params.created_by,
        updated_by: params.updated_by,
        page,
        limit,
        sort_by: params.sort_by,
        sort_order: SortOrder::parse(params.sort_order.as_deref()),
    };

    let started = Instant::now();
    let result = state
        .store
        .list_nodes(&org, &filter)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?;
    debug!(
        %org,
        rows = result.nodes.len(),
        total = result.total_records,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "nodes listed"
    );

    let total_pages = result.total_records.div_ceil(limit as u64);
    let has_next_page = (page as u64) < total_pages;
    let has_prev_page = page > 1;
    let pagination = Pagination {
        page,
        limit,
        total_records: result.total_records,
        total_pages,
        has_next_page,
        has_prev_page,
        next_page: has_next_page.then(|| page + 1),
        prev_page: has_prev_page.then(|| page - 1),
    };

    Ok(Json(NodeListResponse {
        data: result.nodes,
        pagination,
    }))
}

/// POST /:org/nodes
pub async fn create_node(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path(org): Path<String>,
    Json(body): Json<CreateNodeRequest>,
) -> Result<Json<Node>, ApiError> {
    principal.require(&org, PermissionLevel::Write)?;

    let node = Node {
        id: body
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_id),
        org_id: org.clone(),
        node_type: body
            .node_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_NODE_TYPE.to_string()),
        properties: body.properties.unwrap_or_else(|| json!({})),
        audit: Audit::new(&principal.sub, &principal.user_agent, &principal.client_ip),
    };

    let started = Instant::now();
    state
        .store
        .upsert_node(&node)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?;

    // On conflict the store keeps the original creation metadata; read the
    // committed row back so the cache and response reflect it.
    let stored = state
        .store
        .get_node(&org, &node.id)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?
        .unwrap_or(node);
    state.cache.insert(&stored);
    debug!(%org, id = %stored.id, elapsed_ms = started.elapsed().as_millis() as u64, "node upserted");

    Ok(Json(stored))
}

/// PUT /:org/nodes/:id
pub async fn update_node(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path((org, id)): Path<(String, String)>,
    Json(body): Json<UpdateNodeRequest>,
) -> Result<Json<Node>, ApiError> {
    principal.require(&org, PermissionLevel::Write)?;

    let mut node = state
        .store
        .get_node(&org, &id)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?
        .ok_or_else(|| ApiError::NotFound("Node not found".into()))?;

    if let Some(node_type) = body.node_type.filter(|t| !t.is_empty()) {
        node.node_type = node_type;
    }
    if let Some(patch) = &body.properties {
        node.properties = merge_properties(&node.properties, patch);
    }
    node.audit
        .touch(&principal.sub, &principal.user_agent, &principal.client_ip);

    state
        .store
        .upsert_node(&node)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?;
    state.cache.insert(&node);
    debug!(%org, %id, "node updated");

    Ok(Json(node))
}

/// DELETE /:org/nodes/:id — also removes edges incident to the node
/// within the same org.
pub async fn delete_node(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path((org, id)): Path<(String, String)>,
) -> Result<Json<DeleteNodeResponse>, ApiError> {
    principal.require(&org, PermissionLevel::Write)?;

    let node = state
        .store
        .get_node(&org, &id)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?
        .ok_or_else(|| ApiError::NotFound("Node not found".into()))?;

    let incident = state
        .store
        .incident_edges(&org, &id)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?;
    let edge_ids: Vec<String> = incident.into_iter().map(|e| e.id).collect();
    let deleted_edges = state
        .store
        .delete_edges_by_ids(&org, &edge_ids)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?;

    state
        .store
        .delete_node(&org, &id)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?;
    state.cache.remove(&org, &id);
    debug!(%org, %id, deleted_edges, "node deleted with incident edges");

    Ok(Json(DeleteNodeResponse {
        deleted: node.id,
        deleted_edges,
        timestamp: now_rfc3339(),
    }))
}
