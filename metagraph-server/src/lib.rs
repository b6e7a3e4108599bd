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

//! Metagraph Server
//!
//! Multi-tenant property-graph metadata service: authenticated node/edge
//! CRUD over a durable relational store with a read-through cache, bounded
//! traversal, combined graph queries, snapshot import/export, and a
//! best-effort edge vectorization side channel.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod embedding;
pub mod snapshots;
pub mod vector;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metagraph_store::GraphStore;

use api::{health_check, request_context, AppState};
use auth::{auth_middleware, oidc_callback, session_auth_middleware, OidcVerifier};
use cache::NodeCache;
use config::ServerConfig;
use embedding::HttpEmbeddingProvider;
use snapshots::SnapshotStore;
use vector::{EdgeVectorizer, VectorIndexClient};

/// Build the full application router over the shared state.
pub fn build_router(state: AppState, verifier: Arc<OidcVerifier>, config: &ServerConfig) -> Router {
    // The browser-session surface accepts the session cookie only; every
    // other authenticated route takes bearer or cookie.
    let session_routes = Router::new()
        .route("/orgs", get(api::orgs::list_orgs))
        .layer(axum_middleware::from_fn(session_auth_middleware));

    let authed_routes = Router::new()
        .route(
            "/:org/nodes",
            get(api::nodes::list_nodes).post(api::nodes::create_node),
        )
        .route(
            "/:org/nodes/:id",
            get(api::nodes::get_node)
                .put(api::nodes::update_node)
                .delete(api::nodes::delete_node),
        )
        .route("/:org/edges", get(api::edges::list_edges))
        .route("/:org/edge", post(api::edges::create_edge))
        .route(
            "/:org/edge/:id",
            get(api::edges::get_edge)
                .put(api::edges::update_edge)
                .patch(api::edges::update_edge)
                .delete(api::edges::delete_edge),
        )
        .route("/:org/query", post(api::graph::query_graph))
        .route("/:org/traverse", post(api::traverse::traverse_graph))
        .route("/:org/metadata/export", get(api::snapshot::export_metadata))
        .route("/:org/metadata/import", post(api::snapshot::import_metadata))
        .layer(axum_middleware::from_fn(auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/callback", get(oidc_callback))
        .merge(session_routes)
        .merge(authed_routes)
        .with_state(state)
        .layer(Extension(verifier))
        .layer(axum_middleware::from_fn(request_context))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

/// CORS per configuration: configured origins get the standard method set
/// with credentials; no configuration means no CORS headers at all.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_filter())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Metagraph Server");
    config.validate()?;

    // Durable store
    tracing::info!("Opening durable store at: {}", config.database.url);
    let store = GraphStore::connect(&config.database.url).await?;
    if config.database.init_schema {
        tracing::info!("INIT_DB set, applying schema");
        store.init_schema().await?;
    }

    // Auth gate
    let verifier = Arc::new(OidcVerifier::new(&config.auth)?);

    // Vectorization side channel, only when fully configured
    let vectorizer = match (&config.vector.url, &config.embedding.api_key) {
        (Some(url), Some(api_key)) => {
            tracing::info!(
                collection = %config.vector.edge_collection,
                "vector index configured"
            );
            let index = VectorIndexClient::new(&config.vector, url.clone())?;
            let embedder = Arc::new(HttpEmbeddingProvider::new(
                &config.embedding,
                api_key.clone(),
            )?);
            Some(Arc::new(EdgeVectorizer::new(embedder, index)))
        }
        _ => {
            tracing::info!("vector index not configured, edge vectorization disabled");
            None
        }
    };

    let state = AppState {
        store,
        cache: NodeCache::new(&config.cache),
        snapshots: SnapshotStore::new(&config.snapshots.dir),
        vectorizer,
    };

    let app = build_router(state, verifier, &config);

    let addr = config.socket_addr()?;
    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
