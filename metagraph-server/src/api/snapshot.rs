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

//! Metadata export and import.
//!
//! Export returns the full org snapshot and archives the same blob to the
//! snapshot store; archival is best-effort and never fails the response.
//! Import UPSERTs every record, so replays converge instead of
//! duplicating. Imported records keep the audit fields they carry;
//! missing ones default from the importing principal.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, warn};

use metagraph_core::{
    generate_id, now_rfc3339, Audit, Edge, Node, PermissionLevel, Snapshot,
    DEFAULT_NODE_TYPE, DEFAULT_RELATIONSHIP_TYPE,
};

use crate::api::{ApiError, AppState, RequestId};
use crate::auth::Principal;
use crate::snapshots::SnapshotMetadata;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Partial audit block accepted on imported records.
#[derive(Debug, Default, Deserialize)]
pub struct ImportAudit {
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
}

impl ImportAudit {
    /// Overlay the carried fields onto principal-derived defaults.
    fn resolve(self, defaults: Audit) -> Audit {
        Audit {
            created_at: self.created_at.unwrap_or(defaults.created_at),
            updated_at: self.updated_at.unwrap_or(defaults.updated_at),
            created_by: self.created_by.unwrap_or(defaults.created_by),
            updated_by: self.updated_by.unwrap_or(defaults.updated_by),
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
            client_ip: self.client_ip.unwrap_or(defaults.client_ip),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ImportNode {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub properties: Option<Value>,
    #[serde(flatten)]
    pub audit: ImportAudit,
}

#[derive(Debug, Deserialize)]
pub struct ImportEdge {
    pub id: Option<String>,
    pub from_node: Option<String>,
    pub to_node: Option<String>,
    pub relationship_type: Option<String>,
    pub properties: Option<Value>,
    #[serde(flatten)]
    pub audit: ImportAudit,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub nodes: Vec<ImportNode>,
    #[serde(default)]
    pub edges: Vec<ImportEdge>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub org_id: String,
    pub imported_nodes: usize,
    pub imported_edges: usize,
    pub timestamp: String,
    pub imported_by: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /:org/metadata/export
pub async fn export_metadata(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path(org): Path<String>,
) -> Result<Json<Snapshot>, ApiError> {
    principal.require(&org, PermissionLevel::Read)?;

    let started = Instant::now();
    let nodes = state
        .store
        .all_nodes(&org)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?;
    let edges = state
        .store
        .all_edges(&org)
        .await
        .map_err(|e| ApiError::internal(&request_id, e))?;
    let snapshot = Snapshot::new(&org, nodes, edges);
    debug!(
        %org,
        nodes = snapshot.nodes.len(),
        edges = snapshot.edges.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "snapshot assembled"
    );

    // Archive a copy; the response does not depend on it.
    let key = format!("export-{org}-{}.json", chrono::Utc::now().timestamp_millis());
    let metadata = SnapshotMetadata {
        exported_at: snapshot.timestamp.clone(),
        org_id: org.clone(),
        node_count: snapshot.nodes.len(),
        edge_count: snapshot.edges.len(),
    };
    match serde_json::to_vec(&snapshot) {
        Ok(blob) => {
            if let Err(e) = state.snapshots.put(&key, &blob, &metadata).await {
                warn!(%org, %key, "snapshot archival failed: {e}");
            }
        }
        Err(e) => warn!(%org, "snapshot serialization for archival failed: {e}"),
    }

    Ok(Json(snapshot))
}

/// POST /:org/metadata/import
pub async fn import_metadata(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(request_id): Extension<RequestId>,
    Path(org): Path<String>,
    Json(body): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, ApiError> {
    principal.require(&org, PermissionLevel::Write)?;

    let started = Instant::now();
    let mut imported_nodes = 0;
    for incoming in body.nodes {
        let defaults = Audit::new(&principal.sub, &principal.user_agent, &principal.client_ip);
        let node = Node {
            id: incoming
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(generate_id),
            org_id: org.clone(),
            node_type: incoming
                .node_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_NODE_TYPE.to_string()),
            properties: incoming.properties.unwrap_or_else(|| json!({})),
            audit: incoming.audit.resolve(defaults),
        };
        state
            .store
            .upsert_node(&node)
            .await
            .map_err(|e| ApiError::internal(&request_id, e))?;
        let stored = state
            .store
            .get_node(&org, &node.id)
            .await
            .map_err(|e| ApiError::internal(&request_id, e))?
            .unwrap_or(node);
        state.cache.insert(&stored);
        imported_nodes += 1;
    }

    let mut imported_edges = 0;
    for incoming in body.edges {
        let (Some(from_node), Some(to_node)) = (
            incoming.from_node.filter(|n| !n.is_empty()),
            incoming.to_node.filter(|n| !n.is_empty()),
        ) else {
            return Err(ApiError::BadRequest(
                "from_node and to_node are required".into(),
            ));
        };
        let defaults = Audit::new(&principal.sub, &principal.user_agent, &principal.client_ip);
        let edge = Edge {
            id: incoming
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(generate_id),
            org_id: org.clone(),
            from_node,
            to_node,
            relationship_type: incoming
                .relationship_type
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_RELATIONSHIP_TYPE.to_string()),
            properties: incoming.properties.unwrap_or_else(|| json!({})),
            audit: incoming.audit.resolve(defaults),
        };
        state
            .store
            .upsert_edge(&edge)
            .await
            .map_err(|e| ApiError::internal(&request_id, e))?;
        imported_edges += 1;
    }

    debug!(
        %org,
        imported_nodes,
        imported_edges,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "import completed"
    );

    Ok(Json(ImportResponse {
        org_id: org,
        imported_nodes,
        imported_edges,
        timestamp: now_rfc3339(),
        imported_by: principal.sub.clone(),
    }))
}
