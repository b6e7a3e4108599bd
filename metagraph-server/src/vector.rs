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

//! Edge vectorization side channel.
//!
//! An edge whose properties carry a `vectorize` list of keys gets a text
//! rendering of those properties embedded and upserted into the external
//! vector index, keyed by the edge id. The index is invoked only after
//! the durable write has committed and its failures never invalidate that
//! write.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use metagraph_core::{Edge, VECTORIZE_KEY};

use crate::config::VectorConfig;
use crate::embedding::{EmbeddingError, EmbeddingProvider};

#[derive(Debug, thiserror::Error)]
pub enum VectorizeError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("vector index request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("vector index rejected upsert: {0}")]
    Rejected(reqwest::StatusCode),
}

#[derive(Serialize)]
struct PointPayload<'a> {
    edge_id: &'a str,
    from_node: &'a str,
    to_node: &'a str,
    org_id: &'a str,
    relationship_type: &'a str,
}

#[derive(Serialize)]
struct Point<'a> {
    id: String,
    vector: &'a [f32],
    payload: PointPayload<'a>,
}

#[derive(Serialize)]
struct UpsertPointsRequest<'a> {
    points: [Point<'a>; 1],
}

/// REST client for the similarity index's points API.
pub struct VectorIndexClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
}

impl VectorIndexClient {
    pub fn new(config: &VectorConfig, base_url: String) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            collection: config.edge_collection.clone(),
        })
    }

    /// Upsert one point for the edge. The point id must be stable across
    /// retries, so it is derived from the edge id; the payload carries the
    /// real id for lookups.
    pub async fn upsert_edge_point(
        &self,
        edge: &Edge,
        vector: &[f32],
    ) -> Result<(), VectorizeError> {
        let body = UpsertPointsRequest {
            points: [Point {
                id: point_id(&edge.id),
                vector,
                payload: PointPayload {
                    edge_id: &edge.id,
                    from_node: &edge.from_node,
                    to_node: &edge.to_node,
                    org_id: &edge.org_id,
                    relationship_type: &edge.relationship_type,
                },
            }],
        };

        let mut request = self
            .http
            .put(format!(
                "{}/collections/{}/points",
                self.base_url, self.collection
            ))
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.header("api-key", api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(VectorizeError::Rejected(response.status()));
        }
        Ok(())
    }
}

/// Point ids are UUIDs; the edge id is arbitrary caller text, so hash it
/// into a stable v5 UUID.
fn point_id(edge_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, edge_id.as_bytes()).to_string()
}

/// Embedding provider + index client pair owned by the app state.
pub struct EdgeVectorizer {
    embedder: Arc<dyn EmbeddingProvider>,
    index: VectorIndexClient,
}

impl EdgeVectorizer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: VectorIndexClient) -> Self {
        Self { embedder, index }
    }

    /// Run the side channel for an edge. Returns `false` when the edge
    /// carries no vectorization hint.
    pub async fn vectorize(&self, edge: &Edge) -> Result<bool, VectorizeError> {
        let Some(text) = embedding_text(&edge.properties) else {
            return Ok(false);
        };

        let vector = self.embedder.embed(&text).await?;
        self.index.upsert_edge_point(edge, &vector).await?;
        Ok(true)
    }
}

/// Render the properties named by the `vectorize` list into the embedding
/// input. Per key present: `"<key, lowercased, underscores as spaces>:
/// <value>"`, where the value is a lowercased string, an object's
/// `description`, or compact JSON; sections join with blank lines.
pub fn embedding_text(properties: &Value) -> Option<String> {
    let keys = properties.get(VECTORIZE_KEY)?.as_array()?;

    let mut sections = Vec::new();
    for key in keys.iter().filter_map(|k| k.as_str()) {
        let Some(value) = properties.get(key) else {
            continue;
        };
        let rendered = match value {
            Value::String(s) => s.to_lowercase(),
            Value::Object(fields) => match fields.get("description").and_then(|d| d.as_str()) {
                Some(description) => description.to_string(),
                None => value.to_string(),
            },
            other => other.to_string(),
        };
        let label = key.to_lowercase().replace('_', " ");
        sections.push(format!("{label}: {rendered}"));
    }

    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}
