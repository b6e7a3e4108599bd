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

//! Metagraph Store
//!
//! Durable source of truth: nodes and edges live in two relational tables
//! keyed by the composite `(id, org_id)`. Every query, update, and delete
//! filters by `org_id`; no statement in this crate touches more than one
//! tenant. All writes are UPSERTs or single-row deletes, so client retries
//! are safe without transactions.

pub mod edges;
pub mod neighborhood;
pub mod nodes;
pub mod schema;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub use edges::EdgeFilter;
pub use neighborhood::Neighborhood;
pub use nodes::{NodeFilter, NodePage, SortOrder};

/// Store-layer error. Expected absence is expressed as `Ok(None)` by the
/// lookup methods, never as an error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Handle to the durable store. Cheap to clone; wraps a connection pool.
#[derive(Clone)]
pub struct GraphStore {
    pool: SqlitePool,
}

impl GraphStore {
    /// Open (or create) the database behind `url`.
    ///
    /// In-memory databases are clamped to a single connection: every pooled
    /// connection would otherwise see its own private database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Create tables and indexes if they do not exist. Invoked at startup
    /// when `INIT_DB` is set; idempotent.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        schema::apply(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
