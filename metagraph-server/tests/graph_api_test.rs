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

//! Graph engine integration tests: handlers driven directly against an
//! in-memory store, covering CRUD, caching, tenant isolation, traversal,
//! snapshot round-trips, and the permission gate.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{Request, StatusCode};
use axum::{Extension, Json};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use metagraph_core::{PermissionSet, Snapshot};
use metagraph_server::api::edges::{
    create_edge, delete_edge, get_edge, list_edges, update_edge, CreateEdgeRequest,
    EdgeListParams, UpdateEdgeRequest,
};
use metagraph_server::api::graph::{query_graph, GraphQueryRequest};
use metagraph_server::api::nodes::{
    create_node, delete_node, get_node, list_nodes, update_node, CreateNodeRequest,
    NodeListParams, UpdateNodeRequest,
};
use metagraph_server::api::orgs::list_orgs;
use metagraph_server::api::snapshot::{export_metadata, import_metadata, ImportRequest};
use metagraph_server::api::traverse::{traverse_graph, TraverseRequest};
use metagraph_server::api::{ApiError, AppState, RequestId};
use metagraph_server::auth::{OidcVerifier, Principal};
use metagraph_server::build_router;
use metagraph_server::cache::{CacheOutcome, NodeCache};
use metagraph_server::config::{CacheConfig, ServerConfig};
use metagraph_server::snapshots::SnapshotStore;
use metagraph_store::GraphStore;

async fn test_state() -> (AppState, tempfile::TempDir) {
    let store = GraphStore::connect("sqlite::memory:").await.unwrap();
    store.init_schema().await.unwrap();
    let snapshots = tempfile::tempdir().unwrap();
    let state = AppState {
        store,
        cache: NodeCache::new(&CacheConfig {
            max_entries: 1_000,
            ttl_secs: 60,
        }),
        snapshots: SnapshotStore::new(snapshots.path()),
        vectorizer: None,
    };
    (state, snapshots)
}

fn principal(scopes: &[&str]) -> Principal {
    Principal {
        sub: "auth0|tester".into(),
        email: "tester@example.com".into(),
        permissions: PermissionSet::from_scopes(scopes.iter().copied()),
        client_ip: "203.0.113.7".into(),
        user_agent: "graph-api-test".into(),
    }
}

fn rid() -> RequestId {
    RequestId::new()
}

fn create_body(id: Option<&str>, node_type: Option<&str>, properties: serde_json::Value) -> CreateNodeRequest {
    CreateNodeRequest {
        id: id.map(String::from),
        node_type: node_type.map(String::from),
        properties: Some(properties),
    }
}

fn edge_body(
    id: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    rel: Option<&str>,
) -> CreateEdgeRequest {
    CreateEdgeRequest {
        id: id.map(String::from),
        from_node: from.map(String::from),
        to_node: to.map(String::from),
        relationship_type: rel.map(String::from),
        properties: None,
    }
}

// ============================================================================
// Nodes
// ============================================================================

#[tokio::test]
async fn create_and_read_node() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    let created = create_node(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path("acme".into()),
        Json(create_body(None, Some("user"), json!({"name": "Alice"}))),
    )
    .await
    .unwrap()
    .0;
    assert!(!created.id.is_empty());
    assert_eq!(created.node_type, "user");
    assert_eq!(created.audit.created_by, "auth0|tester");
    assert_eq!(created.audit.client_ip, "203.0.113.7");

    // Write-through population means the first read is already a HIT.
    let read = get_node(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path(("acme".into(), created.id.clone())),
    )
    .await
    .unwrap();
    assert_eq!(read.cache, CacheOutcome::Hit);
    assert_eq!(read.node.node_type, "user");
    assert_eq!(read.node.properties["name"], "Alice");
}

#[tokio::test]
async fn read_miss_populates_cache() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    create_node(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path("acme".into()),
        Json(create_body(Some("n1"), Some("user"), json!({}))),
    )
    .await
    .unwrap();

    // Simulate cache expiry.
    state.cache.remove("acme", "n1");

    let first = get_node(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path(("acme".into(), "n1".into())),
    )
    .await
    .unwrap();
    assert_eq!(first.cache, CacheOutcome::Miss);

    let second = get_node(
        State(state.clone()),
        Extension(writer),
        Extension(rid()),
        Path(("acme".into(), "n1".into())),
    )
    .await
    .unwrap();
    assert_eq!(second.cache, CacheOutcome::Hit);
}

#[tokio::test]
async fn missing_node_is_not_found() {
    let (state, _dir) = test_state().await;
    let reader = principal(&["acme:read"]);

    let err = get_node(
        State(state),
        Extension(reader),
        Extension(rid()),
        Path(("acme".into(), "ghost".into())),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn create_is_idempotent_and_preserves_creation_audit() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    let first = create_node(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path("acme".into()),
        Json(create_body(Some("pin"), Some("user"), json!({"v": 1}))),
    )
    .await
    .unwrap()
    .0;

    let second = create_node(
        State(state.clone()),
        Extension(writer),
        Extension(rid()),
        Path("acme".into()),
        Json(create_body(Some("pin"), Some("user"), json!({"v": 2}))),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(second.id, "pin");
    assert_eq!(second.properties["v"], 2);
    assert_eq!(second.audit.created_at, first.audit.created_at);
    assert_eq!(state.store.count_nodes("acme").await.unwrap(), 1);
}

#[tokio::test]
async fn update_merges_properties_shallowly() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    create_node(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path("acme".into()),
        Json(create_body(
            Some("n1"),
            Some("user"),
            json!({"name": "Alice", "team": "data"}),
        )),
    )
    .await
    .unwrap();

    let updated = update_node(
        State(state.clone()),
        Extension(writer),
        Extension(rid()),
        Path(("acme".into(), "n1".into())),
        Json(UpdateNodeRequest {
            node_type: None,
            properties: Some(json!({"team": "platform", "level": 4})),
        }),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(updated.node_type, "user");
    assert_eq!(updated.properties["name"], "Alice");
    assert_eq!(updated.properties["team"], "platform");
    assert_eq!(updated.properties["level"], 4);
    assert_eq!(updated.audit.created_by, "auth0|tester");
}

#[tokio::test]
async fn update_missing_node_is_not_found() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    let err = update_node(
        State(state),
        Extension(writer),
        Extension(rid()),
        Path(("acme".into(), "ghost".into())),
        Json(UpdateNodeRequest {
            node_type: Some("user".into()),
            properties: None,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn pagination_covers_all_records_without_overlap() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    for i in 0..7 {
        create_node(
            State(state.clone()),
            Extension(writer.clone()),
            Extension(rid()),
            Path("acme".into()),
            Json(create_body(Some(&format!("n{i}")), Some("item"), json!({}))),
        )
        .await
        .unwrap();
    }

    let mut seen = Vec::new();
    let mut page = 1;
    loop {
        let response = list_nodes(
            State(state.clone()),
            Extension(writer.clone()),
            Extension(rid()),
            Path("acme".into()),
            Query(NodeListParams {
                node_type: None,
                created_by: None,
                updated_by: None,
                page: Some(page),
                limit: Some(3),
                sort_by: Some("id".into()),
                sort_order: Some("ASC".into()),
            }),
        )
        .await
        .unwrap()
        .0;

        assert_eq!(response.pagination.total_records, 7);
        assert_eq!(response.pagination.total_pages, 3);
        assert_eq!(response.pagination.has_prev_page, page > 1);
        seen.extend(response.data.into_iter().map(|n| n.id));

        if !response.pagination.has_next_page {
            break;
        }
        page = response.pagination.next_page.unwrap();
    }

    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 7);
}

#[tokio::test]
async fn list_filters_by_type() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    for (id, node_type) in [("u1", "user"), ("u2", "user"), ("d1", "document")] {
        create_node(
            State(state.clone()),
            Extension(writer.clone()),
            Extension(rid()),
            Path("acme".into()),
            Json(create_body(Some(id), Some(node_type), json!({}))),
        )
        .await
        .unwrap();
    }

    let response = list_nodes(
        State(state),
        Extension(writer),
        Extension(rid()),
        Path("acme".into()),
        Query(NodeListParams {
            node_type: Some("user".into()),
            created_by: None,
            updated_by: None,
            page: None,
            limit: None,
            sort_by: None,
            sort_order: None,
        }),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(response.pagination.total_records, 2);
    assert!(response.data.iter().all(|n| n.node_type == "user"));
}

// ============================================================================
// Deletion cascade
// ============================================================================

#[tokio::test]
async fn node_deletion_cascades_to_incident_edges() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    for id in ["a", "b"] {
        create_node(
            State(state.clone()),
            Extension(writer.clone()),
            Extension(rid()),
            Path("acme".into()),
            Json(create_body(Some(id), Some("user"), json!({}))),
        )
        .await
        .unwrap();
    }
    let edge = create_edge(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path("acme".into()),
        Json(edge_body(Some("e1"), Some("a"), Some("b"), Some("follows"))),
    )
    .await
    .unwrap()
    .0;

    let response = delete_node(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path(("acme".into(), "a".into())),
    )
    .await
    .unwrap()
    .0;
    assert_eq!(response.deleted, "a");
    assert!(response.deleted_edges >= 1);
    assert!(!response.timestamp.is_empty());

    // The edge is gone, and so are the node row and its cache entry.
    let err = get_edge(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path(("acme".into(), edge.id)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    assert!(state.cache.get("acme", "a").is_none());
    let err = get_node(
        State(state),
        Extension(writer),
        Extension(rid()),
        Path(("acme".into(), "a".into())),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn deleting_isolated_node_reports_zero_edges() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    create_node(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path("acme".into()),
        Json(create_body(Some("lonely"), None, json!({}))),
    )
    .await
    .unwrap();

    let response = delete_node(
        State(state),
        Extension(writer),
        Extension(rid()),
        Path(("acme".into(), "lonely".into())),
    )
    .await
    .unwrap()
    .0;
    assert_eq!(response.deleted_edges, 0);
}

// ============================================================================
// Edges
// ============================================================================

#[tokio::test]
async fn edge_requires_endpoints() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    let err = create_edge(
        State(state),
        Extension(writer),
        Extension(rid()),
        Path("acme".into()),
        Json(edge_body(None, Some("a"), None, None)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
}

#[tokio::test]
async fn edge_defaults_relationship_type() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    let edge = create_edge(
        State(state),
        Extension(writer),
        Extension(rid()),
        Path("acme".into()),
        Json(edge_body(None, Some("a"), Some("b"), None)),
    )
    .await
    .unwrap()
    .0;
    assert_eq!(edge.relationship_type, "related");
}

#[tokio::test]
async fn edge_update_preserves_endpoints() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    create_edge(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path("acme".into()),
        Json(CreateEdgeRequest {
            id: Some("e1".into()),
            from_node: Some("a".into()),
            to_node: Some("b".into()),
            relationship_type: Some("follows".into()),
            properties: Some(json!({"since": 2023})),
        }),
    )
    .await
    .unwrap();

    let updated = update_edge(
        State(state),
        Extension(writer),
        Extension(rid()),
        Path(("acme".into(), "e1".into())),
        Json(UpdateEdgeRequest {
            relationship_type: Some("mentors".into()),
            properties: Some(json!({"active": true})),
        }),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(updated.from_node, "a");
    assert_eq!(updated.to_node, "b");
    assert_eq!(updated.relationship_type, "mentors");
    assert_eq!(updated.properties["since"], 2023);
    assert_eq!(updated.properties["active"], true);
}

#[tokio::test]
async fn edge_listing_filters_and_metadata() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    for (id, from, to, rel) in [
        ("e1", "a", "b", "follows"),
        ("e2", "a", "c", "manages"),
        ("e3", "c", "b", "follows"),
    ] {
        create_edge(
            State(state.clone()),
            Extension(writer.clone()),
            Extension(rid()),
            Path("acme".into()),
            Json(edge_body(Some(id), Some(from), Some(to), Some(rel))),
        )
        .await
        .unwrap();
    }

    let response = list_edges(
        State(state),
        Extension(writer),
        Extension(rid()),
        Path("acme".into()),
        Query(EdgeListParams {
            relationship_type: Some("follows".into()),
            from: None,
            to: None,
            limit: None,
        }),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(response.edges.len(), 2);
    assert_eq!(response.metadata.total, 2);
    assert_eq!(response.metadata.org_id, "acme");
    assert_eq!(response.metadata.filters["type"], "follows");
}

#[tokio::test]
async fn edge_delete_then_read_is_not_found() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    create_edge(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path("acme".into()),
        Json(edge_body(Some("e1"), Some("a"), Some("b"), None)),
    )
    .await
    .unwrap();

    let deleted = delete_edge(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path(("acme".into(), "e1".into())),
    )
    .await
    .unwrap()
    .0;
    assert_eq!(deleted.deleted, "e1");
    assert_eq!(deleted.org_id, "acme");

    let err = delete_edge(
        State(state),
        Extension(writer),
        Extension(rid()),
        Path(("acme".into(), "e1".into())),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

// ============================================================================
// Tenant isolation and permissions
// ============================================================================

#[tokio::test]
async fn tenant_isolation_hides_other_orgs_records() {
    let (state, _dir) = test_state().await;
    let test_writer = principal(&["test:write"]);
    let load_test_reader = principal(&["load-test:read", "load-test:write"]);

    let edge = create_edge(
        State(state.clone()),
        Extension(test_writer),
        Extension(rid()),
        Path("test".into()),
        Json(edge_body(None, Some("n1"), Some("n2"), Some("follows"))),
    )
    .await
    .unwrap()
    .0;

    // Same id, different org: indistinguishable from a missing record.
    let err = get_edge(
        State(state),
        Extension(load_test_reader),
        Extension(rid()),
        Path(("load-test".into(), edge.id)),
    )
    .await
    .unwrap_err();
    match err {
        ApiError::NotFound(message) => assert_eq!(message, "Edge not found"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn permission_gradation() {
    let (state, _dir) = test_state().await;
    let reader = principal(&["acme:read"]);

    // read level: listing allowed
    list_nodes(
        State(state.clone()),
        Extension(reader.clone()),
        Extension(rid()),
        Path("acme".into()),
        Query(NodeListParams {
            node_type: None,
            created_by: None,
            updated_by: None,
            page: None,
            limit: None,
            sort_by: None,
            sort_order: None,
        }),
    )
    .await
    .unwrap();

    // read level: writes forbidden
    let err = create_node(
        State(state.clone()),
        Extension(reader.clone()),
        Extension(rid()),
        Path("acme".into()),
        Json(create_body(None, None, json!({}))),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));

    // read level on another org: no access at all
    let err = list_nodes(
        State(state.clone()),
        Extension(reader),
        Extension(rid()),
        Path("other-org".into()),
        Query(NodeListParams {
            node_type: None,
            created_by: None,
            updated_by: None,
            page: None,
            limit: None,
            sort_by: None,
            sort_order: None,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));

    // wildcard write: any org
    let admin = principal(&["*:write"]);
    for org in ["acme", "beta", "load-test"] {
        create_node(
            State(state.clone()),
            Extension(admin.clone()),
            Extension(rid()),
            Path(org.into()),
            Json(create_body(None, None, json!({}))),
        )
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn orgs_reflect_token_scopes() {
    let response = list_orgs(Extension(principal(&[
        "acme:read",
        "acme:write",
        "beta:audit",
    ])))
    .await
    .0;
    assert_eq!(response.orgs, vec!["acme", "beta"]);
}

// ============================================================================
// Auth gate through the router
// ============================================================================

async fn test_router() -> (axum::Router, tempfile::TempDir) {
    let (state, dir) = test_state().await;
    let mut config = ServerConfig::default();
    config.auth.discovery_url =
        Some("https://idp.invalid/.well-known/openid-configuration".into());
    config.auth.client_id = Some("metagraph".into());
    let verifier = Arc::new(OidcVerifier::new(&config.auth).unwrap());
    (build_router(state, verifier, &config), dir)
}

async fn error_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn orgs_rejects_bearer_only_requests() {
    let (app, _dir) = test_router().await;

    // The session surface requires the cookie; a bearer header alone is
    // a missing credential, not an invalid one.
    let request = Request::builder()
        .uri("/orgs")
        .header("authorization", "Bearer some.jwt.token")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = error_body(response).await;
    assert_eq!(body["error"], "Missing authentication token");
}

#[tokio::test]
async fn orgs_rejects_missing_credentials() {
    let (app, _dir) = test_router().await;

    let request = Request::builder()
        .uri("/orgs")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = error_body(response).await;
    assert_eq!(body["error"], "Missing authentication token");
}

#[tokio::test]
async fn graph_routes_reject_missing_credentials() {
    let (app, _dir) = test_router().await;

    let request = Request::builder()
        .uri("/acme/nodes")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = error_body(response).await;
    assert_eq!(body["error"], "Missing authentication token");
}

// ============================================================================
// Query and traversal
// ============================================================================

async fn seed_org_chart(state: &AppState) {
    let writer = principal(&["acme:write"]);
    for (id, node_type) in [
        ("alice", "user"),
        ("bob", "user"),
        ("carol", "user"),
        ("policy", "document"),
        ("hr", "team"),
        ("wiki", "system"),
    ] {
        create_node(
            State(state.clone()),
            Extension(writer.clone()),
            Extension(rid()),
            Path("acme".into()),
            Json(create_body(Some(id), Some(node_type), json!({}))),
        )
        .await
        .unwrap();
    }
    for (id, from, to, rel) in [
        ("e1", "alice", "bob", "manages"),
        ("e2", "alice", "carol", "manages"),
        ("e3", "bob", "policy", "authored"),
        ("e4", "carol", "wiki", "uses"),
        ("e5", "policy", "hr", "references"),
        ("e6", "hr", "wiki", "uses"),
        ("e7", "bob", "carol", "mentors"),
        ("e8", "wiki", "policy", "references"),
    ] {
        create_edge(
            State(state.clone()),
            Extension(writer.clone()),
            Extension(rid()),
            Path("acme".into()),
            Json(edge_body(Some(id), Some(from), Some(to), Some(rel))),
        )
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn query_returns_deduplicated_neighborhood() {
    let (state, _dir) = test_state().await;
    seed_org_chart(&state).await;
    let reader = principal(&["acme:read"]);

    let response = query_graph(
        State(state),
        Extension(reader),
        Extension(rid()),
        Path("acme".into()),
        Json(GraphQueryRequest {
            node_type: None,
            relationship_type: None,
            limit: None,
        }),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(response.metadata.org_id, "acme");
    assert_eq!(response.metadata.total_nodes, response.nodes.len());
    assert_eq!(response.nodes.len(), 6);
    assert_eq!(response.edges.len(), 8);

    let mut node_ids: Vec<_> = response.nodes.iter().map(|n| n.id.clone()).collect();
    node_ids.sort();
    node_ids.dedup();
    assert_eq!(node_ids.len(), 6);
}

#[tokio::test]
async fn traversal_over_dense_graph() {
    let (state, _dir) = test_state().await;
    seed_org_chart(&state).await;
    let reader = principal(&["acme:read"]);

    let response = traverse_graph(
        State(state),
        Extension(reader),
        Extension(rid()),
        Path("acme".into()),
        Json(TraverseRequest {
            start_node: Some("alice".into()),
            max_depth: Some(5),
            relationship_types: None,
        }),
    )
    .await
    .unwrap()
    .0;

    assert!(response.nodes.len() >= 4, "nodes: {}", response.nodes.len());
    assert!(response.edges.len() >= 4, "edges: {}", response.edges.len());
    assert!(
        response.paths.iter().any(|p| p.len() >= 3),
        "paths: {:?}",
        response.paths
    );
    assert_eq!(response.metadata.total_paths, response.paths.len());

    // The visited set keeps every node unique in the result.
    let mut ids: Vec<_> = response.nodes.iter().map(|n| n.id.clone()).collect();
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total);
}

#[tokio::test]
async fn traversal_honors_depth_bound_and_cycles() {
    let (state, _dir) = test_state().await;
    seed_org_chart(&state).await;
    let reader = principal(&["acme:read"]);

    let max_depth = 2;
    let response = traverse_graph(
        State(state),
        Extension(reader),
        Extension(rid()),
        Path("acme".into()),
        Json(TraverseRequest {
            start_node: Some("alice".into()),
            max_depth: Some(max_depth),
            relationship_types: None,
        }),
    )
    .await
    .unwrap()
    .0;

    // Every returned path has at most max_depth + 1 nodes.
    for path in &response.paths {
        assert!(path.len() <= (max_depth + 1) as usize, "path: {path:?}");
    }
}

#[tokio::test]
async fn traversal_filters_relationship_types() {
    let (state, _dir) = test_state().await;
    seed_org_chart(&state).await;
    let reader = principal(&["acme:read"]);

    let response = traverse_graph(
        State(state),
        Extension(reader),
        Extension(rid()),
        Path("acme".into()),
        Json(TraverseRequest {
            start_node: Some("alice".into()),
            max_depth: Some(5),
            relationship_types: Some(vec!["manages".into()]),
        }),
    )
    .await
    .unwrap()
    .0;

    assert!(response
        .edges
        .iter()
        .all(|e| e.relationship_type == "manages"));
    // manages edges only reach bob and carol from alice.
    assert_eq!(response.nodes.len(), 3);
}

#[tokio::test]
async fn traversal_requires_start_node() {
    let (state, _dir) = test_state().await;
    let reader = principal(&["acme:read"]);

    let err = traverse_graph(
        State(state),
        Extension(reader),
        Extension(rid()),
        Path("acme".into()),
        Json(TraverseRequest {
            start_node: None,
            max_depth: None,
            relationship_types: None,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
}

// ============================================================================
// Import / export
// ============================================================================

#[tokio::test]
async fn import_then_export_round_trip() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write", "acme:read", "mirror:write", "mirror:read"]);

    let import: ImportRequest = serde_json::from_value(json!({
        "nodes": [
            {"id": "import-test-1", "type": "imported", "properties": {"source": "import"}},
            {"id": "import-test-2", "type": "imported", "properties": {"source": "import"}},
        ],
        "edges": [
            {"id": "e1", "from_node": "import-test-1", "to_node": "import-test-1", "relationship_type": "self"},
            {"id": "e2", "from_node": "import-test-1", "to_node": "import-test-2", "relationship_type": "parent"},
        ],
    }))
    .unwrap();

    let response = import_metadata(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path("acme".into()),
        Json(import),
    )
    .await
    .unwrap()
    .0;
    assert_eq!(response.imported_nodes, 2);
    assert_eq!(response.imported_edges, 2);
    assert_eq!(response.imported_by, "auth0|tester");

    let read = get_node(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path(("acme".into(), "import-test-1".into())),
    )
    .await
    .unwrap();
    assert_eq!(read.node.node_type, "imported");

    let snapshot: Snapshot = export_metadata(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path("acme".into()),
    )
    .await
    .unwrap()
    .0;
    assert_eq!(snapshot.version, "1.0");
    assert_eq!(snapshot.org_id, "acme");
    assert_eq!(snapshot.nodes.len(), 2);
    assert_eq!(snapshot.edges.len(), 2);
    assert!(!snapshot.timestamp.is_empty());

    // Replay the export into a fresh org: counts and audit survive.
    let replay: ImportRequest = serde_json::from_value(json!({
        "nodes": snapshot.nodes,
        "edges": snapshot.edges,
    }))
    .unwrap();
    import_metadata(
        State(state.clone()),
        Extension(writer.clone()),
        Extension(rid()),
        Path("mirror".into()),
        Json(replay),
    )
    .await
    .unwrap();

    assert_eq!(state.store.count_nodes("mirror").await.unwrap(), 2);
    assert_eq!(state.store.count_edges("mirror").await.unwrap(), 2);

    let original = state.store.get_node("acme", "import-test-1").await.unwrap().unwrap();
    let mirrored = state.store.get_node("mirror", "import-test-1").await.unwrap().unwrap();
    assert_eq!(mirrored.audit.created_at, original.audit.created_at);
    assert_eq!(mirrored.audit.created_by, original.audit.created_by);
    assert_eq!(mirrored.org_id, "mirror");
}

#[tokio::test]
async fn import_is_idempotent() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    let body = json!({
        "nodes": [{"id": "n1", "type": "imported"}],
        "edges": [{"id": "e1", "from_node": "n1", "to_node": "n1"}],
    });
    for _ in 0..2 {
        let import: ImportRequest = serde_json::from_value(body.clone()).unwrap();
        import_metadata(
            State(state.clone()),
            Extension(writer.clone()),
            Extension(rid()),
            Path("acme".into()),
            Json(import),
        )
        .await
        .unwrap();
    }

    assert_eq!(state.store.count_nodes("acme").await.unwrap(), 1);
    assert_eq!(state.store.count_edges("acme").await.unwrap(), 1);
}

#[tokio::test]
async fn import_rejects_edges_without_endpoints() {
    let (state, _dir) = test_state().await;
    let writer = principal(&["acme:write"]);

    let import: ImportRequest = serde_json::from_value(json!({
        "edges": [{"id": "e1", "from_node": "n1"}],
    }))
    .unwrap();
    let err = import_metadata(
        State(state),
        Extension(writer),
        Extension(rid()),
        Path("acme".into()),
        Json(import),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
}
