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

//! Node persistence.
//!
//! Creation is an UPSERT on `(id, org_id)`: the conflict clause rewrites
//! every mutable column but leaves `created_at`/`created_by` untouched, so
//! retried creates are idempotent and creation metadata is immutable.

use metagraph_core::Node;
use sqlx::{QueryBuilder, Sqlite};

use crate::{GraphStore, StoreError};

/// Sort direction for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.eq_ignore_ascii_case("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filter, paging, and sort parameters for node listings.
#[derive(Debug, Clone)]
pub struct NodeFilter {
    pub node_type: Option<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
}

impl Default for NodeFilter {
    fn default() -> Self {
        Self {
            node_type: None,
            created_by: None,
            updated_by: None,
            page: 1,
            limit: 100,
            sort_by: None,
            sort_order: SortOrder::Desc,
        }
    }
}

/// One page of nodes plus the filtered total.
#[derive(Debug, Clone)]
pub struct NodePage {
    pub nodes: Vec<Node>,
    pub total_records: u64,
}

#[derive(Debug, sqlx::FromRow)]
struct NodeRow {
    id: String,
    org_id: String,
    #[sqlx(rename = "type")]
    node_type: String,
    properties: String,
    created_at: String,
    updated_at: String,
    created_by: String,
    updated_by: String,
    user_agent: String,
    client_ip: String,
}

impl NodeRow {
    fn hydrate(self) -> Node {
        Node {
            id: self.id,
            org_id: self.org_id,
            node_type: self.node_type,
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

/// Properties live in a TEXT column; rows predating validation may hold
/// junk, which hydrates as an empty object instead of poisoning reads.
pub(crate) fn parse_properties(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| {
        tracing::warn!("unparseable properties column, substituting empty object");
        serde_json::Value::Object(Default::default())
    })
}

/// Only these columns are sortable; anything else falls back to the
/// default so caller input never reaches the ORDER BY clause verbatim.
fn sort_column(requested: Option<&str>) -> &'static str {
    match requested {
        Some("id") => "id",
        Some("type") => "type",
        Some("updated_at") => "updated_at",
        Some("created_by") => "created_by",
        Some("updated_by") => "updated_by",
        _ => "created_at",
    }
}

const NODE_COLUMNS: &str = "id, org_id, type, properties, created_at, updated_at, \
                            created_by, updated_by, user_agent, client_ip";

impl GraphStore {
    /// Insert the node, or replace its mutable columns on `(id, org_id)`
    /// conflict. Creation metadata survives the conflict path.
    pub async fn upsert_node(&self, node: &Node) -> Result<(), StoreError> {
        let properties = serde_json::to_string(&node.properties)?;
        sqlx::query(
            r#"
            INSERT INTO nodes (id, org_id, type, properties, created_at, updated_at,
                               created_by, updated_by, user_agent, client_ip)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id, org_id) DO UPDATE SET
                type = excluded.type,
                properties = excluded.properties,
                updated_at = excluded.updated_at,
                updated_by = excluded.updated_by,
                user_agent = excluded.user_agent,
                client_ip = excluded.client_ip
            "#,
        )
        .bind(&node.id)
        .bind(&node.org_id)
        .bind(&node.node_type)
        .bind(&properties)
        .bind(&node.audit.created_at)
        .bind(&node.audit.updated_at)
        .bind(&node.audit.created_by)
        .bind(&node.audit.updated_by)
        .bind(&node.audit.user_agent)
        .bind(&node.audit.client_ip)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_node(&self, org: &str, id: &str) -> Result<Option<Node>, StoreError> {
        let row: Option<NodeRow> = sqlx::query_as(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE id = ? AND org_id = ?"
        ))
        .bind(id)
        .bind(org)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(NodeRow::hydrate))
    }

    /// Filtered, paged, sorted listing plus the COUNT over the same
    /// predicates.
    pub async fn list_nodes(
        &self,
        org: &str,
        filter: &NodeFilter,
    ) -> Result<NodePage, StoreError> {
        let limit = filter.limit.max(1) as i64;
        let page = filter.page.max(1) as i64;
        let offset = (page - 1) * limit;

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {NODE_COLUMNS} FROM nodes WHERE org_id = "));
        query.push_bind(org);
        push_node_predicates(&mut query, filter);
        query
            .push(" ORDER BY ")
            .push(sort_column(filter.sort_by.as_deref()))
            .push(" ")
            .push(filter.sort_order.as_sql())
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<NodeRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut count: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM nodes WHERE org_id = ");
        count.push_bind(org);
        push_node_predicates(&mut count, filter);
        let total_records: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(NodePage {
            nodes: rows.into_iter().map(NodeRow::hydrate).collect(),
            total_records: total_records.max(0) as u64,
        })
    }

    /// Remove the node row. Returns whether a row existed.
    pub async fn delete_node(&self, org: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM nodes WHERE id = ? AND org_id = ?")
            .bind(id)
            .bind(org)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every node of the org, for snapshot export.
    pub async fn all_nodes(&self, org: &str) -> Result<Vec<Node>, StoreError> {
        let rows: Vec<NodeRow> = sqlx::query_as(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE org_id = ? ORDER BY created_at"
        ))
        .bind(org)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(NodeRow::hydrate).collect())
    }

    pub async fn count_nodes(&self, org: &str) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes WHERE org_id = ?")
            .bind(org)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

fn push_node_predicates<'a>(query: &mut QueryBuilder<'a, Sqlite>, filter: &'a NodeFilter) {
    if let Some(node_type) = &filter.node_type {
        query.push(" AND type = ").push_bind(node_type);
    }
    if let Some(created_by) = &filter.created_by {
        query.push(" AND created_by = ").push_bind(created_by);
    }
    if let Some(updated_by) = &filter.updated_by {
        query.push(" AND updated_by = ").push_bind(updated_by);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_column_whitelist() {
        assert_eq!(sort_column(Some("type")), "type");
        assert_eq!(sort_column(Some("updated_at")), "updated_at");
        // Injection attempts and unknown columns fall back.
        assert_eq!(sort_column(Some("created_at; DROP TABLE nodes")), "created_at");
        assert_eq!(sort_column(None), "created_at");
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse(Some("ASC")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("asc")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("desc")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(Some("sideways")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(None), SortOrder::Desc);
    }

    #[test]
    fn test_parse_properties_tolerates_junk() {
        assert_eq!(parse_properties("{\"a\":1}"), serde_json::json!({"a": 1}));
        assert_eq!(
            parse_properties("not json"),
            serde_json::Value::Object(Default::default())
        );
    }
}
