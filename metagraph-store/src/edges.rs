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

//! Edge persistence. Same UPSERT discipline as nodes; additionally serves
//! the traversal path (org-scoped outgoing edges with an optional
//! relationship inclusion list) and the node-deletion cascade.

use metagraph_core::Edge;
use sqlx::{QueryBuilder, Sqlite};

use crate::nodes::parse_properties;
use crate::{GraphStore, StoreError};

/// Filters for edge listings. `limit` bounds the result set.
#[derive(Debug, Clone)]
pub struct EdgeFilter {
    pub relationship_type: Option<String>,
    pub from_node: Option<String>,
    pub to_node: Option<String>,
    pub limit: u32,
}

impl Default for EdgeFilter {
    fn default() -> Self {
        Self {
            relationship_type: None,
            from_node: None,
            to_node: None,
            limit: 100,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EdgeRow {
    id: String,
    org_id: String,
    from_node: String,
    to_node: String,
    relationship_type: String,
    properties: String,
    created_at: String,
    updated_at: String,
    created_by: String,
    updated_by: String,
    user_agent: String,
    client_ip: String,
}

impl EdgeRow {
    fn hydrate(self) -> Edge {
        Edge {
            id: self.id,
            org_id: self.org_id,
            from_node: self.from_node,
            to_node: self.to_node,
            relationship_type: self.relationship_type,
            properties: parse_properties(&self.properties),
            audit: metagraph_core::Audit {
                created_at: self.created_at,
                updated_at: self.updated_at,
                created_by: self.created_by,
                updated_by: self.updated_by,
                user_agent: self.user_agent,
                client_ip: self.client_ip,
            },
        }
    }
}

const EDGE_COLUMNS: &str = "id, org_id, from_node, to_node, relationship_type, properties, \
                            created_at, updated_at, created_by, updated_by, user_agent, client_ip";

impl GraphStore {
    pub async fn upsert_edge(&self, edge: &Edge) -> Result<(), StoreError> {
        let properties = serde_json::to_string(&edge.properties)?;
        sqlx::query(
            r#"
            INSERT INTO edges (id, org_id, from_node, to_node, relationship_type, properties,
                               created_at, updated_at, created_by, updated_by, user_agent, client_ip)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id, org_id) DO UPDATE SET
                from_node = excluded.from_node,
                to_node = excluded.to_node,
                relationship_type = excluded.relationship_type,
                properties = excluded.properties,
                updated_at = excluded.updated_at,
                updated_by = excluded.updated_by,
                user_agent = excluded.user_agent,
                client_ip = excluded.client_ip
            "#,
        )
        .bind(&edge.id)
        .bind(&edge.org_id)
        .bind(&edge.from_node)
        .bind(&edge.to_node)
        .bind(&edge.relationship_type)
        .bind(&properties)
        .bind(&edge.audit.created_at)
        .bind(&edge.audit.updated_at)
        .bind(&edge.audit.created_by)
        .bind(&edge.audit.updated_by)
        .bind(&edge.audit.user_agent)
        .bind(&edge.audit.client_ip)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_edge(&self, org: &str, id: &str) -> Result<Option<Edge>, StoreError> {
        let row: Option<EdgeRow> = sqlx::query_as(&format!(
            "SELECT {EDGE_COLUMNS} FROM edges WHERE id = ? AND org_id = ?"
        ))
        .bind(id)
        .bind(org)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(EdgeRow::hydrate))
    }

    pub async fn list_edges(&self, org: &str, filter: &EdgeFilter) -> Result<Vec<Edge>, StoreError> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {EDGE_COLUMNS} FROM edges WHERE org_id = "));
        query.push_bind(org);
        if let Some(relationship_type) = &filter.relationship_type {
            query.push(" AND relationship_type = ").push_bind(relationship_type);
        }
        if let Some(from_node) = &filter.from_node {
            query.push(" AND from_node = ").push_bind(from_node);
        }
        if let Some(to_node) = &filter.to_node {
            query.push(" AND to_node = ").push_bind(to_node);
        }
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit.max(1) as i64);

        let rows: Vec<EdgeRow> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(EdgeRow::hydrate).collect())
    }

    /// Outgoing edges of `from_node`, optionally restricted to an
    /// inclusion list of relationship types. Traversal hot path.
    pub async fn outgoing_edges(
        &self,
        org: &str,
        from_node: &str,
        relationship_types: Option<&[String]>,
    ) -> Result<Vec<Edge>, StoreError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {EDGE_COLUMNS} FROM edges WHERE org_id = "
        ));
        query.push_bind(org);
        query.push(" AND from_node = ").push_bind(from_node);
        if let Some(types) = relationship_types {
            if !types.is_empty() {
                query.push(" AND relationship_type IN (");
                let mut separated = query.separated(", ");
                for relationship_type in types {
                    separated.push_bind(relationship_type);
                }
                separated.push_unseparated(")");
            }
        }
        query.push(" ORDER BY created_at");

        let rows: Vec<EdgeRow> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(EdgeRow::hydrate).collect())
    }

    /// Edges touching `node_id` in either direction, org-scoped. Used to
    /// plan the deletion cascade.
    pub async fn incident_edges(&self, org: &str, node_id: &str) -> Result<Vec<Edge>, StoreError> {
        let rows: Vec<EdgeRow> = sqlx::query_as(&format!(
            "SELECT {EDGE_COLUMNS} FROM edges \
             WHERE org_id = ? AND (from_node = ? OR to_node = ?)"
        ))
        .bind(org)
        .bind(node_id)
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(EdgeRow::hydrate).collect())
    }

    /// Delete a batch of edges in one IN-list statement. Returns the number
    /// of rows removed.
    pub async fn delete_edges_by_ids(
        &self,
        org: &str,
        ids: &[String],
    ) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM edges WHERE org_id = ");
        query.push_bind(org);
        query.push(" AND id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_edge(&self, org: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM edges WHERE id = ? AND org_id = ?")
            .bind(id)
            .bind(org)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every edge of the org, for snapshot export.
    pub async fn all_edges(&self, org: &str) -> Result<Vec<Edge>, StoreError> {
        let rows: Vec<EdgeRow> = sqlx::query_as(&format!(
            "SELECT {EDGE_COLUMNS} FROM edges WHERE org_id = ? ORDER BY created_at"
        ))
        .bind(org)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(EdgeRow::hydrate).collect())
    }

    pub async fn count_edges(&self, org: &str) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM edges WHERE org_id = ?")
            .bind(org)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}
