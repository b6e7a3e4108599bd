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

//! Combined node/edge query: one LEFT JOIN of nodes onto their incident
//! edges, org-scoped, with optional type predicates. Rows fan out per
//! incident edge, so results are deduplicated by id before returning.

use std::collections::HashSet;

use metagraph_core::{Audit, Edge, Node};
use sqlx::{QueryBuilder, Sqlite};

use crate::nodes::parse_properties;
use crate::{GraphStore, StoreError};

/// Deduplicated result of a neighborhood query.
#[derive(Debug, Clone, Default)]
pub struct Neighborhood {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, sqlx::FromRow)]
struct JoinRow {
    n_id: String,
    n_org_id: String,
    n_type: String,
    n_properties: String,
    n_created_at: String,
    n_updated_at: String,
    n_created_by: String,
    n_updated_by: String,
    n_user_agent: String,
    n_client_ip: String,
    e_id: Option<String>,
    e_from_node: Option<String>,
    e_to_node: Option<String>,
    e_relationship_type: Option<String>,
    e_properties: Option<String>,
    e_created_at: Option<String>,
    e_updated_at: Option<String>,
    e_created_by: Option<String>,
    e_updated_by: Option<String>,
    e_user_agent: Option<String>,
    e_client_ip: Option<String>,
}

impl JoinRow {
    fn node(&self) -> Node {
        Node {
            id: self.n_id.clone(),
            org_id: self.n_org_id.clone(),
            node_type: self.n_type.clone(),
            properties: parse_properties(&self.n_properties),
            audit: Audit {
                created_at: self.n_created_at.clone(),
                updated_at: self.n_updated_at.clone(),
                created_by: self.n_created_by.clone(),
                updated_by: self.n_updated_by.clone(),
                user_agent: self.n_user_agent.clone(),
                client_ip: self.n_client_ip.clone(),
            },
        }
    }

    fn edge(&self) -> Option<Edge> {
        let id = self.e_id.clone()?;
        Some(Edge {
            id,
            org_id: self.n_org_id.clone(),
            from_node: self.e_from_node.clone().unwrap_or_default(),
            to_node: self.e_to_node.clone().unwrap_or_default(),
            relationship_type: self.e_relationship_type.clone().unwrap_or_default(),
            properties: parse_properties(self.e_properties.as_deref().unwrap_or("{}")),
            audit: Audit {
                created_at: self.e_created_at.clone().unwrap_or_default(),
                updated_at: self.e_updated_at.clone().unwrap_or_default(),
                created_by: self.e_created_by.clone().unwrap_or_default(),
                updated_by: self.e_updated_by.clone().unwrap_or_default(),
                user_agent: self.e_user_agent.clone().unwrap_or_default(),
                client_ip: self.e_client_ip.clone().unwrap_or_default(),
            },
        })
    }
}

const JOIN_SELECT: &str = "\
    SELECT n.id AS n_id, n.org_id AS n_org_id, n.type AS n_type, n.properties AS n_properties, \
           n.created_at AS n_created_at, n.updated_at AS n_updated_at, \
           n.created_by AS n_created_by, n.updated_by AS n_updated_by, \
           n.user_agent AS n_user_agent, n.client_ip AS n_client_ip, \
           e.id AS e_id, e.from_node AS e_from_node, e.to_node AS e_to_node, \
           e.relationship_type AS e_relationship_type, e.properties AS e_properties, \
           e.created_at AS e_created_at, e.updated_at AS e_updated_at, \
           e.created_by AS e_created_by, e.updated_by AS e_updated_by, \
           e.user_agent AS e_user_agent, e.client_ip AS e_client_ip \
    FROM nodes n \
    LEFT JOIN edges e \
      ON (n.id = e.from_node OR n.id = e.to_node) AND e.org_id = n.org_id \
    WHERE n.org_id = ";

impl GraphStore {
    /// Nodes joined with their incident edges, filtered by optional node
    /// and relationship type, bounded by `limit` joined rows.
    pub async fn query_neighborhood(
        &self,
        org: &str,
        node_type: Option<&str>,
        relationship_type: Option<&str>,
        limit: u32,
    ) -> Result<Neighborhood, StoreError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(JOIN_SELECT);
        query.push_bind(org);
        if let Some(node_type) = node_type {
            query.push(" AND n.type = ").push_bind(node_type);
        }
        if let Some(relationship_type) = relationship_type {
            query
                .push(" AND e.relationship_type = ")
                .push_bind(relationship_type);
        }
        query.push(" LIMIT ").push_bind(limit.max(1) as i64);

        let rows: Vec<JoinRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut neighborhood = Neighborhood::default();
        let mut seen_nodes: HashSet<String> = HashSet::new();
        let mut seen_edges: HashSet<String> = HashSet::new();

        for row in &rows {
            if seen_nodes.insert(row.n_id.clone()) {
                neighborhood.nodes.push(row.node());
            }
            if let Some(edge) = row.edge() {
                if seen_edges.insert(edge.id.clone()) {
                    neighborhood.edges.push(edge);
                }
            }
        }

        Ok(neighborhood)
    }
}
