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

//! Bounded graph traversal: outgoing-edge, depth-limited DFS.
//!
//! A path is recorded when the walk terminates at the depth bound or at an
//! already-visited node, so cycles end paths instead of recursing forever.
//! The visited set guarantees each node appears at most once in the node
//! list. State is request-local; the walk is sequential, so no guards.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::debug;

use metagraph_core::{Edge, Node, PermissionLevel};
use metagraph_store::{GraphStore, StoreError};

use crate::api::{ApiError, AppState, RequestId};
use crate::auth::Principal;

const DEFAULT_MAX_DEPTH: u32 = 3;

#[derive(Debug, Deserialize)]
pub struct TraverseRequest {
    pub start_node: Option<String>,
    pub max_depth: Option<u32>,
    /// Inclusion list; omitted means every relationship type.
    pub relationship_types: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct TraverseMetadata {
    pub org_id: String,
    pub start_node: String,
    pub max_depth: u32,
    pub relationship_types: Option<Vec<String>>,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_paths: usize,
}

#[derive(Debug, Serialize)]
pub struct TraverseResponse {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub paths: Vec<Vec<String>>,
    pub metadata: TraverseMetadata,
}

#[derive(Default)]
struct Traversal {
    visited: HashSet<String>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    paths: Vec<Vec<String>>,
}

/// POST /:org/traverse
pub async fn traverse_graph(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path(org): Path<String>,
    Json(body): Json<TraverseRequest>,
) -> Result<Json<TraverseResponse>, ApiError> {
    principal.require(&org, PermissionLevel::Read)?;

    let Some(start_node) = body.start_node.filter(|n| !n.is_empty()) else {
        return Err(ApiError::BadRequest("start_node is required".into()));
    };
    let max_depth = body.max_depth.unwrap_or(DEFAULT_MAX_DEPTH);

    let started = Instant::now();
    let result = walk(
        &state.store,
        &org,
        &start_node,
        max_depth,
        body.relationship_types.as_deref(),
    )
    .await
    .map_err(|e| ApiError::internal(&request_id, e))?;
    debug!(
        %org,
        %start_node,
        max_depth,
        nodes = result.nodes.len(),
        edges = result.edges.len(),
        paths = result.paths.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "traversal completed"
    );

    let metadata = TraverseMetadata {
        org_id: org,
        start_node,
        max_depth,
        relationship_types: body.relationship_types,
        total_nodes: result.nodes.len(),
        total_edges: result.edges.len(),
        total_paths: result.paths.len(),
    };
    Ok(Json(TraverseResponse {
        nodes: result.nodes,
        edges: result.edges,
        paths: result.paths,
        metadata,
    }))
}

/// Depth-first walk over outgoing edges with an explicit stack. A frame is
/// examined on pop: at the depth bound or a visited node the current path
/// is emitted (when longer than the bare start) and the branch ends.
async fn walk(
    store: &GraphStore,
    org: &str,
    start_node: &str,
    max_depth: u32,
    relationship_types: Option<&[String]>,
) -> Result<Traversal, StoreError> {
    let mut out = Traversal::default();
    let mut stack: Vec<(String, u32, Vec<String>)> =
        vec![(start_node.to_string(), 0, vec![start_node.to_string()])];

    while let Some((node_id, depth, path)) = stack.pop() {
        if depth >= max_depth || out.visited.contains(&node_id) {
            if path.len() > 1 {
                out.paths.push(path);
            }
            continue;
        }
        out.visited.insert(node_id.clone());

        if let Some(node) = store.get_node(org, &node_id).await? {
            out.nodes.push(node);
        }

        let edges = store
            .outgoing_edges(org, &node_id, relationship_types)
            .await?;
        // Reverse push keeps sibling edges in fetch order on the stack.
        for edge in edges.iter().rev() {
            let mut next_path = path.clone();
            next_path.push(edge.to_node.clone());
            stack.push((edge.to_node.clone(), depth + 1, next_path));
        }
        out.edges.extend(edges);
    }

    Ok(out)
}
