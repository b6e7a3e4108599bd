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

//! Combined graph query: nodes joined onto their incident edges in a
//! single outer-join statement, deduplicated, with query timing in the
//! response metadata.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use metagraph_core::{Edge, Node, PermissionLevel};

use crate::api::{ApiError, AppState, RequestId};
use crate::auth::Principal;

#[derive(Debug, Deserialize)]
pub struct GraphQueryRequest {
    pub node_type: Option<String>,
    pub relationship_type: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct GraphQueryMetadata {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub query_time_ms: u64,
    pub org_id: String,
}

#[derive(Debug, Serialize)]
pub struct GraphQueryResponse {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub metadata: GraphQueryMetadata,
}

/// POST /:org/query
pub async fn query_graph(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path(org): Path<String>,
    Json(body): Json<GraphQueryRequest>,
) -> Result<Json<GraphQueryResponse>, ApiError> {
    principal.require(&org, PermissionLevel::Read)?;

    let started = Instant::now();
    let neighborhood = state
        .store
        .query_neighborhood(
            &org,
            body.node_type.as_deref(),
            body.relationship_type.as_deref(),
            body.limit.unwrap_or(100),
        )
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?;
    let query_time_ms = started.elapsed().as_millis() as u64;
    debug!(
        %org,
        nodes = neighborhood.nodes.len(),
        edges = neighborhood.edges.len(),
        query_time_ms,
        "graph query completed"
    );

    let metadata = GraphQueryMetadata {
        total_nodes: neighborhood.nodes.len(),
        total_edges: neighborhood.edges.len(),
        query_time_ms,
        org_id: org,
    };
    Ok(Json(GraphQueryResponse {
        nodes: neighborhood.nodes,
        edges: neighborhood.edges,
        metadata,
    }))
}
