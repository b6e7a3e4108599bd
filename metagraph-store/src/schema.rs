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

//! Table and index definitions. Both tables share the composite primary
//! key `(id, org_id)`; the index set covers every filterable column plus
//! the org-scoped composites the hot paths use.

use sqlx::sqlite::SqlitePool;

use crate::StoreError;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS nodes (
        id          TEXT NOT NULL,
        org_id      TEXT NOT NULL,
        type        TEXT NOT NULL,
        properties  TEXT NOT NULL DEFAULT '{}',
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL,
        created_by  TEXT NOT NULL DEFAULT '',
        updated_by  TEXT NOT NULL DEFAULT '',
        user_agent  TEXT NOT NULL DEFAULT '',
        client_ip   TEXT NOT NULL DEFAULT '',
        PRIMARY KEY (id, org_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS edges (
        id                 TEXT NOT NULL,
        org_id             TEXT NOT NULL,
        from_node          TEXT NOT NULL,
        to_node            TEXT NOT NULL,
        relationship_type  TEXT NOT NULL DEFAULT 'related',
        properties         TEXT NOT NULL DEFAULT '{}',
        created_at         TEXT NOT NULL,
        updated_at         TEXT NOT NULL,
        created_by         TEXT NOT NULL DEFAULT '',
        updated_by         TEXT NOT NULL DEFAULT '',
        user_agent         TEXT NOT NULL DEFAULT '',
        client_ip          TEXT NOT NULL DEFAULT '',
        PRIMARY KEY (id, org_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_nodes_org ON nodes (org_id)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes (type)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_created_by ON nodes (created_by)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_updated_by ON nodes (updated_by)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_created_at ON nodes (created_at)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_updated_at ON nodes (updated_at)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_org_type ON nodes (org_id, type)",
    "CREATE INDEX IF NOT EXISTS idx_edges_org ON edges (org_id)",
    "CREATE INDEX IF NOT EXISTS idx_edges_from ON edges (from_node)",
    "CREATE INDEX IF NOT EXISTS idx_edges_to ON edges (to_node)",
    "CREATE INDEX IF NOT EXISTS idx_edges_rel ON edges (relationship_type)",
    "CREATE INDEX IF NOT EXISTS idx_edges_created_by ON edges (created_by)",
    "CREATE INDEX IF NOT EXISTS idx_edges_updated_by ON edges (updated_by)",
    "CREATE INDEX IF NOT EXISTS idx_edges_created_at ON edges (created_at)",
    "CREATE INDEX IF NOT EXISTS idx_edges_updated_at ON edges (updated_at)",
    "CREATE INDEX IF NOT EXISTS idx_edges_org_from ON edges (org_id, from_node)",
    "CREATE INDEX IF NOT EXISTS idx_edges_org_to ON edges (org_id, to_node)",
    "CREATE INDEX IF NOT EXISTS idx_edges_org_rel ON edges (org_id, relationship_type)",
];

pub async fn apply(pool: &SqlitePool) -> Result<(), StoreError> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::debug!("schema applied: {} statements", STATEMENTS.len());
    Ok(())
}
